//! Resource type relationship tables.
//!
//! The remote API models its objects as a typed graph. For each resource type
//! a schema declares:
//! - the parent type (ownership edge, at most one),
//! - child types (listed under `{child}s` attributes),
//! - reference types (`{type}_refs` attributes),
//! - back-reference types (`{type}_back_refs` attributes),
//! - declared properties and their default shape.
//!
//! Two implementations of [`Schema`] exist:
//! - [`SchemaTable`]: a concrete, versioned table built from link declarations
//!   (usually loaded from the JSON interchange file, see [`document`]).
//! - [`DummySchema`]: the permissive fallback used when no schema version is
//!   bound. Every observed top-level type is accepted as a child, reference and
//!   back-reference of every other type.
//!
//! Callers that need precise edge typing (for example linking two resources)
//! go through [`require_precise`] or [`require_version`] and fail fast on the
//! dummy table.

pub mod document;
pub mod dummy;
pub mod table;
pub mod version;

use std::sync::Arc;
use thiserror::Error;

pub use document::{LinkDecl, LinkKind, SchemaDocument, SchemaStore, TypeDecl};
pub use dummy::DummySchema;
pub use table::{PropertyDecl, PropertyShape, ResourceSchema, SchemaBuilder, SchemaTable};
pub use version::{ConstraintOp, VersionConstraint};

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema version {0} is not available")]
    VersionNotAvailable(String),
    #[error("resource type `{0}` is not defined in the schema")]
    TypeNotDefined(String),
    #[error("schema requirement not met: {0}")]
    Requirement(String),
    #[error("invalid schema: {0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed schema document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only lookup of resource type declarations.
pub trait Schema: Send + Sync + std::fmt::Debug {
    /// Version of the bound schema, `None` for the dummy fallback.
    fn version(&self) -> Option<&semver::Version>;

    /// Capability flag: `false` when edge typing is only approximate.
    fn is_precise(&self) -> bool {
        self.version().is_some()
    }

    /// Declaration for `type_name`.
    fn resource(&self, type_name: &str) -> Result<Arc<ResourceSchema>>;

    /// Known top-level type names, sorted.
    fn type_names(&self) -> Vec<String>;

    /// Record top-level types seen in the remote index.
    ///
    /// Returns `true` when the set of known types changed. Concrete tables
    /// ignore this.
    fn observe_types(&self, _types: &[String]) -> bool {
        false
    }
}

/// Fail unless a concrete schema is bound.
pub fn require_precise(schema: &dyn Schema) -> Result<()> {
    if schema.is_precise() {
        Ok(())
    } else {
        Err(SchemaError::Requirement(
            "no schema version is bound (pass --schema-version)".to_string(),
        ))
    }
}

/// Fail unless the bound schema satisfies `constraint` (e.g. `>=3.1`).
pub fn require_version(schema: &dyn Schema, constraint: &str) -> Result<()> {
    let constraint: VersionConstraint = constraint.parse()?;
    let Some(version) = schema.version() else {
        return Err(SchemaError::Requirement(format!(
            "schema {constraint} required but no schema version is bound"
        )));
    };
    if constraint.matches(version) {
        Ok(())
    } else {
        Err(SchemaError::Requirement(format!(
            "schema {constraint} required, bound schema is {version}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(version: &str) -> SchemaTable {
        SchemaBuilder::new(version)
            .unwrap()
            .child("domain", "project")
            .build()
    }

    #[test]
    fn require_version_checks_operator() {
        let schema = table("3.2.0");
        assert!(require_version(&schema, ">=3.1").is_ok());
        assert!(require_version(&schema, "=3.2").is_ok());
        assert!(require_version(&schema, "<3.2").is_err());
        assert!(require_version(&schema, ">3.2.0").is_err());
        assert!(require_version(&schema, "<=4").is_ok());
    }

    #[test]
    fn dummy_schema_fails_every_requirement() {
        let dummy = DummySchema::new();
        assert!(matches!(
            require_version(&dummy, ">=1.0"),
            Err(SchemaError::Requirement(_))
        ));
        assert!(require_precise(&dummy).is_err());
        assert!(require_precise(&table("1.0.0")).is_ok());
    }
}
