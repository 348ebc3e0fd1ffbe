//! Error types for collection resolution, enrichment and persistence.
//!
//! Library code returns [`Result`]; the binary and the configuration layer
//! wrap these in `anyhow` for context.

use crate::catalog::EntityKind;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, FlowError>;

/// Everything that can go wrong while pulling items through a collection.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A name could not be mapped to a catalog id.
    #[error("could not resolve {kind} named '{name}'")]
    Resolution { kind: EntityKind, name: String },

    /// The catalog could not deliver records or audio features for an id.
    #[error("remote lookup failed for '{id}': {reason}")]
    RemoteLookup { id: String, reason: String },

    /// Persistence was requested without any cache store.
    #[error("no cache store is configured and none was supplied")]
    CacheUnavailable,

    /// Cache store failure.
    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    /// A catalog record or cached payload did not have the expected shape.
    #[error("malformed record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An operator was called with arguments it cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A shared sequence whose source already failed in another consumer.
    #[error("upstream sequence failed earlier: {0}")]
    UpstreamFailed(String),
}

impl FlowError {
    /// Shorthand for [`FlowError::RemoteLookup`].
    pub fn remote(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RemoteLookup {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error came from the remote catalog.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteLookup { .. } | Self::Resolution { .. })
    }
}
