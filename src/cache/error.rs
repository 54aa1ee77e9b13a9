//! Error types for cache operations
//!
//! A cache miss is not an error: `get` returns `Ok(None)` and `has` returns
//! `false`. Only unexpected filesystem failures and rejected keys surface here.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// Filesystem failure while reading, writing, listing or deleting entries
    #[error("I/O {operation} failed: {}", path.display())]
    Storage {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        /// Operation that failed (e.g., "read", "write", "remove")
        operation: &'static str,
    },

    /// Key that cannot be used as a plain file name inside the cache directory
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Settings file that could not be parsed
    #[error("Invalid cache settings in {}: {message}", path.display())]
    Settings { path: PathBuf, message: String },
}

impl CacheError {
    /// Create a storage error with path context
    #[must_use]
    pub fn storage(source: std::io::Error, path: impl AsRef<Path>, operation: &'static str) -> Self {
        Self::Storage {
            source,
            path: path.as_ref().to_path_buf(),
            operation,
        }
    }

    #[must_use]
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// True for errors caused by the caller's key rather than the filesystem
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidKey { .. })
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
