//! Permissive fallback used when no schema version is bound.

use crate::{Result, ResourceSchema, Schema, SchemaError};
use parking_lot::RwLock;
use semver::Version;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Treats every observed top-level type as a child, reference and
/// back-reference target of every other type.
///
/// The set of known types grows as the remote index is fetched. Lookups of a
/// type never observed fail with [`SchemaError::TypeNotDefined`].
#[derive(Debug, Default)]
pub struct DummySchema {
    types: RwLock<BTreeSet<String>>,
}

impl DummySchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: RwLock::new(types.into_iter().map(Into::into).collect()),
        }
    }
}

impl Schema for DummySchema {
    fn version(&self) -> Option<&Version> {
        None
    }

    fn resource(&self, type_name: &str) -> Result<Arc<ResourceSchema>> {
        let types = self.types.read();
        if !types.contains(type_name) {
            return Err(SchemaError::TypeNotDefined(type_name.to_string()));
        }
        let all: Vec<String> = types.iter().cloned().collect();
        Ok(Arc::new(ResourceSchema {
            name: type_name.to_string(),
            parent: None,
            children: all.clone(),
            refs: all.clone(),
            back_refs: all,
            properties: Vec::new(),
        }))
    }

    fn type_names(&self) -> Vec<String> {
        self.types.read().iter().cloned().collect()
    }

    fn observe_types(&self, types: &[String]) -> bool {
        let mut known = self.types.write();
        let mut changed = false;
        for t in types {
            changed |= known.insert(t.clone());
        }
        changed
    }
}
