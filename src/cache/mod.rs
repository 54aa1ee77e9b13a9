//! Cache module - Manages the flat http_cache directory
//!
//! Provides:
//! - FileCache storage (get/set/has/path/clear)
//! - Error types for storage and key validation
//! - Settings for opening a cache from configuration

pub mod error;
pub mod settings;
pub mod store;
