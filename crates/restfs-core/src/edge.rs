//! Attribute classification: which data keys are typed graph edges.
//!
//! Naming convention on the wire (type names use `-`, attributes use `_`):
//! - `{type}_refs`: references held by this resource,
//! - `{type}_back_refs`: resources referencing this one,
//! - `{type}s`: owned children,
//! - `parent_uuid` (with `parent_type`): the owner.
//!
//! A suffix alone is not enough; the schema must declare the edge for the
//! resource's type, otherwise the key stays plain data.

use parking_lot::RwLock;
use restfs_schema::Schema;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Child(String),
    Parent,
    Reference(String),
    BackReference(String),
    Plain,
}

impl EdgeKind {
    pub fn is_edge(&self) -> bool {
        !matches!(self, Self::Plain)
    }

    /// Type at the other end, when it is fixed by the attribute name.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Child(t) | Self::Reference(t) | Self::BackReference(t) => Some(t),
            Self::Parent | Self::Plain => None,
        }
    }
}

pub fn type_to_attr(type_name: &str) -> String {
    type_name.replace('-', "_")
}

pub fn attr_to_type(attr: &str) -> String {
    attr.replace('_', "-")
}

pub fn refs_attr(type_name: &str) -> String {
    format!("{}_refs", type_to_attr(type_name))
}

pub fn back_refs_attr(type_name: &str) -> String {
    format!("{}_back_refs", type_to_attr(type_name))
}

pub fn children_attr(type_name: &str) -> String {
    format!("{}s", type_to_attr(type_name))
}

pub const PARENT_ATTR: &str = "parent_uuid";

/// Per-(type, attribute) cache of [`EdgeKind`]s.
#[derive(Debug, Default)]
pub struct EdgeClassifier {
    cache: RwLock<HashMap<(String, String), EdgeKind>>,
}

impl EdgeClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn classify(&self, schema: &dyn Schema, type_name: &str, attr: &str) -> EdgeKind {
        let key = (type_name.to_string(), attr.to_string());
        if let Some(kind) = self.cache.read().get(&key) {
            return kind.clone();
        }
        let kind = compute(schema, type_name, attr);
        self.cache.write().insert(key, kind.clone());
        kind
    }

    /// Forget cached answers (the schema learned new types).
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

fn compute(schema: &dyn Schema, type_name: &str, attr: &str) -> EdgeKind {
    let Ok(entry) = schema.resource(type_name) else {
        return EdgeKind::Plain;
    };
    if attr == PARENT_ATTR {
        // The dummy schema has no parent declarations; trust `parent_type`.
        return if entry.parent.is_some() || !schema.is_precise() {
            EdgeKind::Parent
        } else {
            EdgeKind::Plain
        };
    }
    if let Some(base) = attr.strip_suffix("_back_refs") {
        let target = attr_to_type(base);
        return if entry.has_back_ref(&target) {
            EdgeKind::BackReference(target)
        } else {
            EdgeKind::Plain
        };
    }
    if let Some(base) = attr.strip_suffix("_refs") {
        let target = attr_to_type(base);
        return if entry.has_ref(&target) {
            EdgeKind::Reference(target)
        } else {
            EdgeKind::Plain
        };
    }
    if let Some(base) = attr.strip_suffix('s') {
        let target = attr_to_type(base);
        if entry.has_child(&target) {
            return EdgeKind::Child(target);
        }
    }
    EdgeKind::Plain
}
