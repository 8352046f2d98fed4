//! Concrete, versioned schema table.

use crate::version::parse_version;
use crate::{Result, Schema, SchemaError};
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Declarations
// ============================================================================

/// Default shape of a declared property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyShape {
    #[default]
    Scalar,
    List,
    Map,
}

impl PropertyShape {
    /// JSON value a property of this shape holds when unset.
    pub fn default_value(self) -> Value {
        match self {
            Self::Scalar => Value::Null,
            Self::List => Value::Array(Vec::new()),
            Self::Map => Value::Object(serde_json::Map::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDecl {
    pub name: String,
    #[serde(default)]
    pub shape: PropertyShape,
}

/// Everything the schema declares about one resource type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSchema {
    pub name: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub refs: Vec<String>,
    pub back_refs: Vec<String>,
    pub properties: Vec<PropertyDecl>,
}

impl ResourceSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_child(&self, type_name: &str) -> bool {
        self.children.iter().any(|c| c == type_name)
    }

    pub fn has_ref(&self, type_name: &str) -> bool {
        self.refs.iter().any(|r| r == type_name)
    }

    pub fn has_back_ref(&self, type_name: &str) -> bool {
        self.back_refs.iter().any(|r| r == type_name)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDecl> {
        self.properties.iter().find(|p| p.name == name)
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|x| x == item) {
        list.push(item.to_string());
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates link declarations, keeping both ends of every link in sync.
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    version: Version,
    types: BTreeMap<String, ResourceSchema>,
}

impl SchemaBuilder {
    pub fn new(version: &str) -> Result<Self> {
        Ok(Self {
            version: parse_version(version)?,
            types: BTreeMap::new(),
        })
    }

    fn entry(&mut self, type_name: &str) -> &mut ResourceSchema {
        self.types
            .entry(type_name.to_string())
            .or_insert_with(|| ResourceSchema::new(type_name))
    }

    pub fn declare(mut self, type_name: &str) -> Self {
        self.entry(type_name);
        self
    }

    pub fn property(mut self, type_name: &str, name: &str, shape: PropertyShape) -> Self {
        let entry = self.entry(type_name);
        match entry.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.shape = shape,
            None => entry.properties.push(PropertyDecl {
                name: name.to_string(),
                shape,
            }),
        }
        self
    }

    /// `parent` has-child `child`. A later declaration replaces the child's parent.
    pub fn child(mut self, parent: &str, child: &str) -> Self {
        push_unique(&mut self.entry(parent).children, child);
        self.entry(child).parent = Some(parent.to_string());
        self
    }

    /// `from` references `to`.
    pub fn reference(mut self, from: &str, to: &str) -> Self {
        push_unique(&mut self.entry(from).refs, to);
        push_unique(&mut self.entry(to).back_refs, from);
        self
    }

    pub fn build(self) -> SchemaTable {
        SchemaTable {
            version: self.version,
            types: self
                .types
                .into_iter()
                .map(|(name, entry)| (name, Arc::new(entry)))
                .collect(),
        }
    }
}

// ============================================================================
// Table
// ============================================================================

#[derive(Debug, Clone)]
pub struct SchemaTable {
    version: Version,
    types: BTreeMap<String, Arc<ResourceSchema>>,
}

impl SchemaTable {
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Schema for SchemaTable {
    fn version(&self) -> Option<&Version> {
        Some(&self.version)
    }

    fn resource(&self, type_name: &str) -> Result<Arc<ResourceSchema>> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| SchemaError::TypeNotDefined(type_name.to_string()))
    }

    fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaTable {
        SchemaBuilder::new("3.2")
            .unwrap()
            .child("domain", "project")
            .child("project", "virtual-network")
            .reference("virtual-network", "network-ipam")
            .reference("virtual-network", "network-ipam")
            .property("virtual-network", "route_target_list", PropertyShape::Map)
            .build()
    }

    #[test]
    fn child_links_are_bidirectional() {
        let schema = sample();
        let project = schema.resource("project").unwrap();
        assert_eq!(project.parent.as_deref(), Some("domain"));
        assert!(project.has_child("virtual-network"));
        assert!(schema.resource("domain").unwrap().has_child("project"));
    }

    #[test]
    fn ref_links_are_bidirectional_and_unique() {
        let schema = sample();
        let vn = schema.resource("virtual-network").unwrap();
        assert_eq!(vn.refs, vec!["network-ipam".to_string()]);
        let ipam = schema.resource("network-ipam").unwrap();
        assert_eq!(ipam.back_refs, vec!["virtual-network".to_string()]);
        assert!(!ipam.has_ref("virtual-network"));
    }

    #[test]
    fn unknown_type_is_not_defined() {
        let err = sample().resource("floating-ip").unwrap_err();
        assert!(matches!(err, SchemaError::TypeNotDefined(t) if t == "floating-ip"));
    }

    #[test]
    fn property_defaults_follow_shape() {
        let schema = sample();
        let vn = schema.resource("virtual-network").unwrap();
        let prop = vn.property("route_target_list").unwrap();
        assert_eq!(prop.shape.default_value(), serde_json::json!({}));
        assert_eq!(PropertyShape::List.default_value(), serde_json::json!([]));
        assert!(vn.property("missing").is_none());
        assert_eq!(schema.version(), Some(&Version::new(3, 2, 0)));
        assert_eq!(schema.len(), 4);
    }
}
