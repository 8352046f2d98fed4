//! Edge trees for display.
//!
//! Expanding one level means fetching every node on it; those fetches run on
//! a bounded rayon pool. Results are collected in submission order, so the
//! tree is identical whatever the worker count.

use crate::{EdgeKind, Error, Path, Resource, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Which edges a tree follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeSelector {
    Refs,
    BackRefs,
    Children,
    Parent,
}

impl EdgeSelector {
    pub const ALL: [EdgeSelector; 4] = [Self::Refs, Self::BackRefs, Self::Children, Self::Parent];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refs => "refs",
            Self::BackRefs => "back-refs",
            Self::Children => "children",
            Self::Parent => "parent",
        }
    }

    fn selects(self, kind: &EdgeKind) -> bool {
        matches!(
            (self, kind),
            (Self::Refs, EdgeKind::Reference(_))
                | (Self::BackRefs, EdgeKind::BackReference(_))
                | (Self::Children, EdgeKind::Child(_))
                | (Self::Parent, EdgeKind::Parent)
        )
    }
}

impl fmt::Display for EdgeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeSelector {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "refs" => Ok(Self::Refs),
            "back-refs" | "backrefs" => Ok(Self::BackRefs),
            "children" => Ok(Self::Children),
            "parent" => Ok(Self::Parent),
            other => Err(format!(
                "unknown edge kind `{other}` (expected refs|back-refs|children|parent)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Levels below the root.
    pub depth: u32,
    pub kinds: Vec<EdgeSelector>,
    pub workers: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            kinds: vec![EdgeSelector::Refs],
            workers: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fq_name: Option<String>,
    /// Edge attribute this node was reached through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Nodes in the tree, root included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::node_count).sum::<usize>()
    }
}

pub fn build_tree(root: &Resource, options: &TreeOptions) -> Result<TreeNode> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(options.workers.max(1))
        .thread_name(|i| format!("restfs-tree-{i}"))
        .build()
        .map_err(|e| Error::WorkerPool(e.to_string()))?;
    expand(&pool, root.clone(), None, options.depth, options)
}

fn expand(
    pool: &ThreadPool,
    mut resource: Resource,
    via: Option<String>,
    depth: u32,
    options: &TreeOptions,
) -> Result<TreeNode> {
    let mut edges = Vec::new();
    if depth > 0 {
        resource.fetch(1)?;
        edges = selected_edges(&resource, &options.kinds);
    }
    let path = resource
        .path()
        .ok_or_else(|| Error::Unidentified(format!("{} resource", resource.type_name())))?;

    let children = parallel_map(pool, edges, |(attr, next)| {
        expand(pool, next, Some(attr), depth - 1, options)
    })
    .into_iter()
    .collect::<Result<Vec<_>>>()?;

    Ok(TreeNode {
        path,
        fq_name: resource.fq_name().map(ToString::to_string),
        via,
        children,
    })
}

/// Parent first, then linked resources by attribute name.
fn selected_edges(resource: &Resource, kinds: &[EdgeSelector]) -> Vec<(String, Resource)> {
    let mut out = Vec::new();
    if kinds.contains(&EdgeSelector::Parent) {
        if let Some(parent) = resource.parent() {
            out.push((crate::edge::PARENT_ATTR.to_string(), parent.clone()));
        }
    }
    for (attr, links) in resource.edges() {
        for link in links {
            if kinds.iter().any(|k| k.selects(&link.kind)) {
                out.push((attr.to_string(), link.resource.clone()));
            }
        }
    }
    out
}

/// Map `f` over `items` on `pool`, keeping input order.
fn parallel_map<T, R, F>(pool: &ThreadPool, items: Vec<T>, f: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    pool.install(|| items.into_par_iter().map(f).collect())
}
