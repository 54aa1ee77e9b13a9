//! Path utilities
//!
//! Resolves where the cache lives on disk and guards the mapping from keys to
//! file names, so no key can address anything outside the cache directory.

use std::path::{Path, PathBuf};

use crate::cache::error::{CacheError, Result};

/// Application directory under the platform cache root
pub const APP_DIR: &str = "httpcache";

/// Fixed subdirectory holding HTTP cache entries
pub const HTTP_CACHE_DIR: &str = "http_cache";

/// Get the cache root for this application
///
/// Uses the platform cache directory (e.g. `~/.cache` on Linux) and falls back
/// to the system temp directory when none is known.
pub fn cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Get the default directory for HTTP cache entries
pub fn default_cache_dir() -> PathBuf {
    cache_root().join(HTTP_CACHE_DIR)
}

/// Check if a path is hidden (starts with '.')
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Validate that a key is a single, visible file name
///
/// Hidden names are reserved for in-flight temporary files.
pub fn validate_key(key: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key.contains('\0') {
        "contains a NUL byte"
    } else if key.contains('/') || key.contains('\\') {
        "contains a path separator"
    } else if key.contains("..") {
        "contains '..'"
    } else if key.starts_with('.') {
        "starts with '.'"
    } else {
        return Ok(());
    };

    Err(CacheError::invalid_key(key, reason))
}

/// Join a validated key onto the cache directory
pub fn entry_path(base: &Path, key: &str) -> Result<PathBuf> {
    validate_key(key)?;
    Ok(base.join(key))
}
