//! httpcache - A disk-backed blob cache with TTL eviction
//!
//! httpcache provides:
//! - One file per entry in a flat cache directory
//! - TTL sweeps driven by file modification time
//! - Access refresh on read, so entries in use never expire
//! - Sweep-on-disposal with the cache's configured TTL

pub mod cache;
pub mod core;

pub use cache::error::{CacheError, Result};
pub use cache::settings::CacheSettings;
pub use cache::store::{EntryInfo, FileCache, SweepReport};
pub use crate::core::util::{generate_key, HashAlgorithm};
