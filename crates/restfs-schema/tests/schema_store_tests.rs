//! Schema store loading tests

use restfs_schema::*;
use std::fs;
use tempfile::tempdir;

const DOC: &str = r#"{
  "version": "3.2",
  "types": {
    "virtual-network": {
      "properties": [
        { "name": "route_target_list", "shape": "map" },
        { "name": "display_name" }
      ]
    }
  },
  "links": [
    { "kind": "has", "from": "domain", "to": "project" },
    { "kind": "has", "from": "project", "to": "virtual-network" },
    { "kind": "ref", "from": "virtual-network", "to": "network-ipam" },
    { "kind": "ref", "from": "virtual-machine-interface", "to": "virtual-network" }
  ]
}"#;

#[test]
fn test_open_known_version() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("3.2.json"), DOC).unwrap();

    let store = SchemaStore::new(dir.path());
    assert_eq!(store.versions().unwrap(), vec!["3.2".to_string()]);

    let schema = store.open("3.2").unwrap();
    assert!(schema.is_precise());
    assert!(require_version(&schema, ">=3.0").is_ok());

    let vn = schema.resource("virtual-network").unwrap();
    assert_eq!(vn.parent.as_deref(), Some("project"));
    assert!(vn.has_ref("network-ipam"));
    assert!(vn.has_back_ref("virtual-machine-interface"));
    assert_eq!(
        vn.property("display_name").map(|p| p.shape),
        Some(PropertyShape::Scalar)
    );
}

#[test]
fn test_missing_version_is_not_available() {
    let dir = tempdir().unwrap();
    let store = SchemaStore::new(dir.path());
    let err = store.open("9.9").unwrap_err();
    assert!(matches!(err, SchemaError::VersionNotAvailable(v) if v == "9.9"));
}

#[test]
fn test_malformed_document_is_rejected() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("1.0.json"), "{ not json").unwrap();
    let store = SchemaStore::new(dir.path());
    assert!(matches!(store.open("1.0"), Err(SchemaError::Json(_))));

    let doc = SchemaDocument {
        version: "1.0".to_string(),
        types: Default::default(),
        links: vec![LinkDecl {
            kind: LinkKind::Ref,
            from: String::new(),
            to: "project".to_string(),
        }],
    };
    assert!(matches!(doc.into_table(), Err(SchemaError::Invalid(_))));
}
