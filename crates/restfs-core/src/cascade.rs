//! Recursive back-reference closure and cascading delete.
//!
//! Walking a seed's back-references (and theirs, recursively) yields every
//! resource that must go before the seed can be deleted. The walk order is
//! kept with replace-on-repeat: a resource seen again moves to the end, so
//! deleting in reverse walk order removes referrers before their targets.

use crate::{Error, Path, Resource, Result};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Seeds plus every transitive back-referrer, in walk order.
pub fn back_ref_closure<I>(seeds: I) -> Result<Vec<Resource>>
where
    I: IntoIterator<Item = Resource>,
{
    let mut acc: IndexMap<Path, Resource> = IndexMap::new();
    let mut on_stack = HashSet::new();
    for seed in seeds {
        walk(seed, &mut acc, &mut on_stack)?;
    }
    Ok(acc.into_values().collect())
}

fn walk(
    mut resource: Resource,
    acc: &mut IndexMap<Path, Resource>,
    on_stack: &mut HashSet<Path>,
) -> Result<()> {
    let path = resource
        .path()
        .ok_or_else(|| Error::Unidentified(format!("{} resource", resource.type_name())))?;
    // A reference cycle would recurse forever.
    if !on_stack.insert(path.clone()) {
        return Ok(());
    }
    resource.fetch(1)?;
    let referrers: Vec<Resource> = resource.back_refs().cloned().collect();
    acc.shift_remove(&path);
    acc.insert(path.clone(), resource);
    for referrer in referrers {
        walk(referrer, acc, on_stack)?;
    }
    on_stack.remove(&path);
    Ok(())
}

/// Delete `seeds` and everything referring to them, referrers first.
///
/// With `dry_run` nothing is deleted; the returned paths are the planned
/// deletion order either way.
pub fn delete_cascade<I>(seeds: I, dry_run: bool) -> Result<Vec<Path>>
where
    I: IntoIterator<Item = Resource>,
{
    let mut plan = back_ref_closure(seeds)?;
    plan.reverse();
    let mut order = Vec::with_capacity(plan.len());
    for mut resource in plan {
        let Some(path) = resource.path() else {
            continue;
        };
        if !dry_run && !resource.delete()? {
            tracing::warn!(%path, "already gone");
        }
        order.push(path);
    }
    tracing::info!(count = order.len(), dry_run, "cascade delete");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Client, EventBus, MemoryRemote};
    use restfs_schema::DummySchema;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn repeated_referrer_moves_to_end() {
        let remote = Arc::new(MemoryRemote::new());
        let client = Client::new(
            remote.clone(),
            Arc::new(DummySchema::with_types(["a", "b", "c"])),
            Arc::new(EventBus::new()),
        );
        // c -> b -> a and c -> a
        let a = remote.insert("a", "default:a", json!({}));
        let b = remote.insert("b", "default:b", json!({}));
        let c = remote.insert("c", "default:c", json!({}));
        remote.add_ref(b, a);
        remote.add_ref(c, a);
        remote.add_ref(c, b);

        let closure = back_ref_closure([client.resource("a", a)]).unwrap();
        let order: Vec<_> = closure.iter().filter_map(Resource::uuid).collect();
        assert_eq!(order.first(), Some(&a));
        let pos = |u| order.iter().position(|x| *x == u).unwrap();
        assert!(pos(c) > pos(b));
        assert_eq!(order.len(), 3);

        let deleted = delete_cascade([client.resource("a", a)], false).unwrap();
        assert_eq!(deleted.len(), 3);
        assert!(remote.is_empty());
    }
}
