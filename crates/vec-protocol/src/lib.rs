//! Client-side synchronization protocol.
//!
//! Three phases against a remote HTTP endpoint: refs enumeration, have/want
//! negotiation, and packfile transfer. Transport failures retry with linear
//! backoff; HTTP 401 triggers a single token refresh. Nothing below this
//! layer writes user-visible output.

mod client;
mod clone;
mod fetch;
mod push;
pub mod types;

pub use client::HttpClient;
pub use clone::{clone, CloneOptions, CloneOutcome};
pub use fetch::{fetch, FetchOptions, FetchOutcome};
pub use push::{push, PushOptions, PushOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Errors surfaced by sync operations, mapped from HTTP status codes and
/// the lower layers' typed errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("authentication required for remote '{0}'")]
    Auth(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("push rejected: not a fast-forward (use force to override)")]
    NonFastForward,

    #[error("push rejected by server: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repo(#[from] vec_repository::RepoError),

    #[error(transparent)]
    Config(#[from] vec_config::ConfigError),

    #[error(transparent)]
    Ref(#[from] vec_ref::RefError),

    #[error(transparent)]
    Store(#[from] vec_store::StoreError),

    #[error(transparent)]
    Pack(#[from] vec_pack::PackError),

    #[error(transparent)]
    Walk(#[from] vec_revwalk::WalkError),

    #[error(transparent)]
    Hash(#[from] vec_hash::HashError),
}

/// Cooperative cancellation flag, checked at operation boundaries.
///
/// Cancellation never interrupts an in-flight request or store write; the
/// orchestrator observes the flag between steps, cleans up its temp
/// artifacts, and returns [`ProtocolError::Cancelled`]. Completed ref
/// writes are not rolled back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Error out if cancellation was requested.
    pub fn check(&self) -> Result<(), ProtocolError> {
        if self.is_cancelled() {
            Err(ProtocolError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Lift a utility error into the protocol error space.
pub(crate) fn util_io(e: vec_utils::UtilError) -> ProtocolError {
    match e {
        vec_utils::UtilError::Io(io) => ProtocolError::Io(io),
        other => ProtocolError::Io(std::io::Error::other(other.to_string())),
    }
}
