//! restfs: a filesystem view over a resource-oriented REST API.
//!
//! ```text
//!   "net*" ──► Resolver ──► Collection ──► Resource ──► Resource (refs, ...)
//!    (cwd)        │             │              │
//!                 │             └── filters ───┤
//!                 ▼                            ▼
//!            Path (normalised)       EdgeClassifier ◄── Schema table
//! ```
//!
//! - [`Path`]: `/type/uuid` resources, `/type` collections, `/` the root.
//! - [`Resource`] / [`Collection`]: lazily fetched graph nodes. Fetching walks
//!   typed edges (`*_refs`, `*_back_refs`, children, parent) up to an explicit
//!   depth.
//! - [`expand_paths`]: globs, fq_names and relative paths to unique nodes.
//! - [`EventBus`]: created/deleted notifications.
//!
//! All remote I/O goes through the [`RemoteSource`] trait: [`HttpRemote`] for
//! the real API, [`MemoryRemote`] for tests.

pub mod cascade;
pub mod client;
pub mod collection;
pub mod edge;
pub mod events;
pub mod fq_name;
pub mod link;
pub mod path;
pub mod remote;
pub mod resolver;
pub mod resource;
pub mod tree;

use thiserror::Error;

pub use cascade::{back_ref_closure, delete_cascade};
pub use client::Client;
pub use collection::{Collection, FetchOptions};
pub use edge::{EdgeClassifier, EdgeKind};
pub use events::{Event, EventBus, Notification};
pub use fq_name::FqName;
pub use link::{link_resources, unlink_resources, LinkOutcome};
pub use path::Path;
#[cfg(feature = "http")]
pub use remote::{HttpRemote, HttpRemoteConfig};
pub use remote::{MemoryRemote, RemoteError, RemoteSource};
pub use resolver::{expand_paths, ExpandOptions, Resolver};
pub use resource::{Link, Resource};
pub use restfs_schema::{self as schema, Schema, SchemaError};
pub use tree::{build_tree, EdgeSelector, TreeNode, TreeOptions};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad path `{path}`: {reason}")]
    BadPath { path: String, reason: String },
    #[error("no resource found")]
    NoResourceFound,
    #[error("{type_name} `{id}` not found")]
    ResourceNotFound { type_name: String, id: String },
    #[error("collection `{0}` not found")]
    CollectionNotFound(String),
    #[error("{0} has no uuid yet (save it first)")]
    Unidentified(String),
    #[error("cannot link {from} and {to}: {reason}")]
    Link {
        from: String,
        to: String,
        reason: String,
    },
    #[error("worker pool: {0}")]
    WorkerPool(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl Error {
    pub(crate) fn bad_path(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::BadPath {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Resource,
    Collection,
}

/// A resolved graph node.
#[derive(Debug, Clone)]
pub enum Node {
    Resource(Resource),
    Collection(Collection),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Resource(_) => NodeKind::Resource,
            Self::Collection(_) => NodeKind::Collection,
        }
    }

    /// `None` only for a resource that has not been saved yet.
    pub fn path(&self) -> Option<Path> {
        match self {
            Self::Resource(r) => r.path(),
            Self::Collection(c) => Some(c.path()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Resource(r) => r.type_name(),
            Self::Collection(c) => c.type_name(),
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Self::Resource(r) => Some(r),
            Self::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Resource(_) => None,
        }
    }

    pub fn into_resource(self) -> Option<Resource> {
        match self {
            Self::Resource(r) => Some(r),
            Self::Collection(_) => None,
        }
    }

    pub fn into_collection(self) -> Option<Collection> {
        match self {
            Self::Collection(c) => Some(c),
            Self::Resource(_) => None,
        }
    }
}
