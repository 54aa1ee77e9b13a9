//! Core module - Shared building blocks for the cache
//!
//! This module provides:
//! - Cache directory resolution and key validation
//! - Hashing and timestamp utilities
//! - Rendering of reports for the CLI

pub mod paths;
pub mod render;
pub mod util;
