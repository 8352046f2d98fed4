//! The remote data source the graph engine talks to.
//!
//! Paths handed to a [`RemoteSource`] are API paths (`/virtual-networks`,
//! `/virtual-network/<uuid>`), not user paths; the engine builds them.

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use crate::FqName;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[cfg(feature = "http")]
pub use http::{HttpRemote, HttpRemoteConfig};
pub use memory::{MemoryRemote, RecordedRequest};

/// Query parameters, in the order they are sent.
pub type Params = [(String, String)];

/// Transport-level failure. Not interpreted by the engine except for 404s.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    #[error("HTTP {status} on {path}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    pub fn decode(path: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Remote API operations the engine relies on.
///
/// Identifier translation returns `Ok(None)` for "not found", keeping it
/// distinct from transport failures.
pub trait RemoteSource: Send + Sync {
    fn get(&self, path: &str, params: &Params) -> Result<Value, RemoteError>;

    fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    fn put(&self, path: &str, body: &Value) -> Result<Value, RemoteError>;

    /// `Ok(false)` when there was nothing to delete.
    fn delete(&self, path: &str) -> Result<bool, RemoteError>;

    fn uuid_for(&self, type_name: &str, fq_name: &FqName) -> Result<Option<Uuid>, RemoteError>;

    fn fq_name_for(&self, type_name: &str, uuid: &Uuid) -> Result<Option<FqName>, RemoteError>;
}
