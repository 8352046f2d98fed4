//! JSON interchange form of a schema table, and the on-disk store of versions.
//!
//! The IDL parser that understands the remote API's schema sources lives
//! elsewhere; it emits one document per schema version:
//!
//! ```json
//! {
//!   "version": "3.2.0",
//!   "types": { "project": { "properties": [{ "name": "quota", "shape": "map" }] } },
//!   "links": [
//!     { "kind": "has", "from": "domain", "to": "project" },
//!     { "kind": "ref", "from": "virtual-network", "to": "network-ipam" }
//!   ]
//! }
//! ```

use crate::table::{PropertyDecl, SchemaBuilder, SchemaTable};
use crate::{Result, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Ownership: `from` is the parent of `to`.
    Has,
    /// Reference: `from` holds `{to}_refs`.
    Ref,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDecl {
    pub kind: LinkKind,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    #[serde(default)]
    pub properties: Vec<PropertyDecl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    pub version: String,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDecl>,
    #[serde(default)]
    pub links: Vec<LinkDecl>,
}

impl SchemaDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_table(self) -> Result<SchemaTable> {
        let mut builder = SchemaBuilder::new(&self.version)?;
        for (name, decl) in &self.types {
            builder = builder.declare(name);
            for prop in &decl.properties {
                builder = builder.property(name, &prop.name, prop.shape);
            }
        }
        for link in &self.links {
            if link.from.is_empty() || link.to.is_empty() {
                return Err(SchemaError::Invalid(format!(
                    "link with empty endpoint: {link:?}"
                )));
            }
            builder = match link.kind {
                LinkKind::Has => builder.child(&link.from, &link.to),
                LinkKind::Ref => builder.reference(&link.from, &link.to),
            };
        }
        Ok(builder.build())
    }
}

/// Directory of `<version>.json` schema documents.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    dir: PathBuf,
}

impl SchemaStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Versions available in the store, sorted by file name.
    pub fn versions(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        if !self.dir.is_dir() {
            return Ok(out);
        }
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                out.push(stem.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Build the table for `version`.
    pub fn open(&self, version: &str) -> Result<SchemaTable> {
        let path = self.dir.join(format!("{version}.json"));
        if !path.is_file() {
            return Err(SchemaError::VersionNotAvailable(version.to_string()));
        }
        let text = fs::read_to_string(&path)?;
        SchemaDocument::from_json(&text)?.into_table()
    }
}
