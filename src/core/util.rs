//! Common utilities

use chrono::{DateTime, SecondsFormat, Utc};
use sha1::{Digest, Sha1};
use std::fs::{File, FileTimes};
use std::time::{Duration, SystemTime};
use xxhash_rust::xxh3::xxh3_64;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha1,
    Xxh3,
}

impl std::str::FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "xxh3" => Ok(HashAlgorithm::Xxh3),
            _ => Err(format!("Unknown hash algorithm: {}", s)),
        }
    }
}

/// Compute hash of bytes
pub fn hash_bytes(data: &[u8], algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Xxh3 => format!("{:016x}", xxh3_64(data)),
        HashAlgorithm::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(data);
            format!("{:x}", hasher.finalize())
        }
    }
}

/// Derive a cache key from a URL
///
/// The key is the hex digest of the URL followed by `suffix` (e.g. `.info`),
/// which is always a valid cache file name as long as the suffix is.
pub fn generate_key(url: &str, suffix: &str) -> String {
    generate_key_with(url, suffix, HashAlgorithm::default())
}

pub fn generate_key_with(url: &str, suffix: &str, algorithm: HashAlgorithm) -> String {
    format!("{}{}", hash_bytes(url.as_bytes(), algorithm), suffix)
}

/// Age of a timestamp relative to `now`; timestamps in the future count as zero
pub fn age_of(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or_default()
}

/// Whether an entry of the given age is stale under `ttl` seconds
///
/// A non-positive ttl makes every entry stale.
pub fn is_stale(age: Duration, ttl: i64) -> bool {
    match u64::try_from(ttl) {
        Ok(secs) if secs > 0 => age >= Duration::from_secs(secs),
        _ => true,
    }
}

/// Set access and modification time of an open file to `now`
pub fn touch(file: &File, now: SystemTime) -> std::io::Result<()> {
    file.set_times(FileTimes::new().set_accessed(now).set_modified(now))
}

/// Format a timestamp as RFC 3339 in UTC
pub fn to_rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}
