//! Cache settings
//!
//! Consumers enable the HTTP cache through a JSON settings object:
//!
//! ```json
//! { "http_cache": true, "http_cache_length": 604800 }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::error::{CacheError, Result};
use crate::cache::store::FileCache;
use crate::core::paths::default_cache_dir;

/// Default entry lifetime: one week
pub const DEFAULT_TTL_SECS: i64 = 604_800;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether consumers should cache HTTP responses at all
    pub http_cache: bool,

    /// Seconds an unused entry stays valid; non-positive disables sweeping
    pub http_cache_length: i64,

    /// Override for the cache directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            http_cache: false,
            http_cache_length: DEFAULT_TTL_SECS,
            cache_dir: None,
        }
    }
}

impl CacheSettings {
    /// Load settings from a JSON file; absent fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| CacheError::storage(e, path, "read settings"))?;
        serde_json::from_str(&content).map_err(|e| CacheError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Directory the cache lives in
    pub fn dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Open the configured cache, or `None` when caching is disabled
    pub fn open(&self) -> Result<Option<FileCache>> {
        if !self.http_cache {
            return Ok(None);
        }
        self.open_always().map(Some)
    }

    /// Open the configured cache regardless of `http_cache`
    pub fn open_always(&self) -> Result<FileCache> {
        FileCache::new(self.http_cache_length, self.dir())
    }
}
