//! Linking two resources by reference.
//!
//! Which side holds the reference depends on the schema, so these operations
//! refuse to run against the permissive fallback schema.

use crate::{Error, Path, Resource, Result};
use restfs_schema::require_precise;

/// Which resource was updated, and which one it now points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub owner: Path,
    pub target: Path,
}

enum Direction {
    Forward,
    Backward,
}

fn direction(a: &Resource, b: &Resource) -> Result<Direction> {
    let schema = a.client().schema();
    require_precise(schema)?;
    let a_entry = schema.resource(a.type_name())?;
    let b_entry = schema.resource(b.type_name())?;
    let err = |reason: &str| Error::Link {
        from: describe(a),
        to: describe(b),
        reason: reason.to_string(),
    };
    if a_entry.has_ref(b.type_name()) {
        Ok(Direction::Forward)
    } else if b_entry.has_ref(a.type_name()) {
        Ok(Direction::Backward)
    } else if a_entry.has_child(b.type_name()) || b_entry.has_child(a.type_name()) {
        Err(err("ownership links are set at creation"))
    } else {
        Err(err("no reference declared between these types"))
    }
}

fn describe(r: &Resource) -> String {
    r.path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| format!("new {}", r.type_name()))
}

fn outcome(owner: &Resource, target: &Resource) -> Result<LinkOutcome> {
    let path = |r: &Resource| {
        r.path()
            .ok_or_else(|| Error::Unidentified(format!("{} resource", r.type_name())))
    };
    Ok(LinkOutcome {
        owner: path(owner)?,
        target: path(target)?,
    })
}

/// Add a reference between `a` and `b` on whichever side declares it, and save.
pub fn link_resources(a: &mut Resource, b: &mut Resource) -> Result<LinkOutcome> {
    let (owner, target) = match direction(a, b)? {
        Direction::Forward => (a, b),
        Direction::Backward => (b, a),
    };
    owner.fetch(0)?;
    owner.add_ref(target, None)?;
    owner.save()?;
    tracing::info!(owner = %describe(owner), target = %describe(target), "linked");
    outcome(owner, target)
}

/// Remove the reference between `a` and `b`. Saves only when one existed.
pub fn unlink_resources(a: &mut Resource, b: &mut Resource) -> Result<LinkOutcome> {
    let (owner, target) = match direction(a, b)? {
        Direction::Forward => (a, b),
        Direction::Backward => (b, a),
    };
    owner.fetch(0)?;
    if owner.remove_ref(target)? {
        owner.save()?;
        tracing::info!(owner = %describe(owner), target = %describe(target), "unlinked");
    }
    outcome(owner, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Client, EventBus, MemoryRemote};
    use restfs_schema::{DummySchema, SchemaBuilder, SchemaError};
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> Arc<restfs_schema::SchemaTable> {
        Arc::new(
            SchemaBuilder::new("3.0")
                .unwrap()
                .child("project", "virtual-network")
                .reference("virtual-network", "network-ipam")
                .build(),
        )
    }

    #[test]
    fn link_picks_the_declaring_side() {
        let remote = Arc::new(MemoryRemote::new());
        let client = Client::new(remote.clone(), schema(), Arc::new(EventBus::new()));
        let net = remote.insert("virtual-network", "default:net", json!({}));
        let ipam = remote.insert("network-ipam", "default:ipam", json!({}));

        let mut a = client.resource("network-ipam", ipam);
        let mut b = client.resource("virtual-network", net);
        let out = link_resources(&mut a, &mut b).unwrap();
        assert_eq!(out.owner, Path::resource("virtual-network", &net));
        let stored = remote.object(&net).unwrap();
        assert_eq!(
            stored["virtual-network"]["network_ipam_refs"][0]["uuid"],
            json!(ipam.to_string())
        );

        unlink_resources(&mut a, &mut b).unwrap();
        let stored = remote.object(&net).unwrap();
        assert_eq!(stored["virtual-network"]["network_ipam_refs"], json!([]));
    }

    #[test]
    fn ownership_and_unrelated_pairs_are_refused() {
        let remote = Arc::new(MemoryRemote::new());
        let client = Client::new(remote.clone(), schema(), Arc::new(EventBus::new()));
        let project = remote.insert("project", "default:p", json!({}));
        let net = remote.insert("virtual-network", "default:p:net", json!({}));
        let ipam = remote.insert("network-ipam", "default:ipam", json!({}));

        let mut p = client.resource("project", project);
        let mut n = client.resource("virtual-network", net);
        let mut i = client.resource("network-ipam", ipam);
        let err = link_resources(&mut p, &mut n).unwrap_err();
        assert!(matches!(err, Error::Link { reason, .. } if reason.contains("ownership")));
        assert!(matches!(link_resources(&mut p, &mut i), Err(Error::Link { .. })));
    }

    #[test]
    fn dummy_schema_is_rejected() {
        let remote = Arc::new(MemoryRemote::new());
        let client = Client::new(
            remote.clone(),
            Arc::new(DummySchema::with_types(["foo", "bar"])),
            Arc::new(EventBus::new()),
        );
        let foo = remote.insert("foo", "default:foo", json!({}));
        let bar = remote.insert("bar", "default:bar", json!({}));
        let err = link_resources(&mut client.resource("foo", foo), &mut client.resource("bar", bar))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(SchemaError::Requirement(_))));
    }
}
