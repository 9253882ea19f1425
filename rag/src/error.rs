//! Error types for the RAG crate.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in index, build, and retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The index configuration is invalid (zero dimension, unknown metric, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Dimension mismatch between a vector and the index.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension provided.
        actual: usize,
    },

    /// The key is already present in the index.
    #[error("duplicate key: {0}")]
    DuplicateKey(u64),

    /// Reading or writing the index file failed.
    #[error("storage error at {path}: {source}")]
    Storage {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The index file is missing, corrupt, or incompatible.
    #[error("invalid index file {path}: {reason}")]
    Format {
        /// Path of the rejected file.
        path: PathBuf,
        /// Why the file was rejected.
        reason: String,
    },

    /// Embedding operation failed.
    #[error("embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),

    /// Text generation failed.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// A gateway call did not finish in time.
    #[error("{gateway} gateway timed out after {timeout:?}")]
    Timeout {
        /// Gateway that timed out.
        gateway: Gateway,
        /// Configured limit.
        timeout: Duration,
    },

    /// The record store failed.
    #[error("record store error: {0}")]
    Records(#[source] anyhow::Error),
}

/// External capability a [`RagError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gateway {
    /// The text embedding service.
    Embedding,
    /// The text generation service.
    Generation,
}

impl fmt::Display for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => f.write_str("embedding"),
            Self::Generation => f.write_str("generation"),
        }
    }
}

/// Coarse classification of [`RagError`]s, used to decide how to react.
///
/// `Config` and `Format` are structural and fatal to the operation. `DimensionMismatch`,
/// `DuplicateKey` and `GatewayUnavailable` only reject the single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad index configuration.
    Config,
    /// Vector length differs from the index dimension.
    DimensionMismatch,
    /// Identifier already indexed.
    DuplicateKey,
    /// I/O failure while saving or loading.
    Storage,
    /// Incompatible or corrupt index file; rebuild the index.
    Format,
    /// Embedding or generation service failed or timed out.
    GatewayUnavailable,
    /// The record store could not be read.
    Records,
}

impl RagError {
    /// Returns the coarse kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::Storage { .. } => ErrorKind::Storage,
            Self::Format { .. } => ErrorKind::Format,
            Self::Embedding(_) | Self::Generation(_) | Self::Timeout { .. } => {
                ErrorKind::GatewayUnavailable
            }
            Self::Records(_) => ErrorKind::Records,
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
