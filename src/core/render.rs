//! Renderer module
//!
//! Renders command output as plain text or JSON

use serde::Serialize;
use std::path::PathBuf;

use crate::cache::store::{EntryInfo, SweepReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

/// Render configuration combining format and options
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
}

impl RenderConfig {
    /// Create a new render config with pretty option
    pub fn with_pretty(format: OutputFormat, pretty: bool) -> Self {
        Self { format, pretty }
    }
}

/// Result of a command, independent of how it is printed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Output {
    Path { key: String, path: PathBuf },
    Presence { key: String, present: bool },
    Stored { key: String, bytes: usize },
    Key { url: String, key: String },
    Sweep(SweepReport),
    Entries { ttl: i64, entries: Vec<EntryInfo> },
}

/// Renderer for command output
pub struct Renderer {
    config: RenderConfig,
}

impl Renderer {
    pub fn with_config(config: RenderConfig) -> Self {
        Self { config }
    }

    /// Render output to a string (without trailing newline)
    pub fn render(&self, output: &Output) -> String {
        match self.config.format {
            OutputFormat::Text => self.render_text(output),
            OutputFormat::Json => self.render_json(output),
        }
    }

    fn render_json(&self, output: &Output) -> String {
        let result = if self.config.pretty {
            serde_json::to_string_pretty(output)
        } else {
            serde_json::to_string(output)
        };
        result.unwrap_or_else(|e| format!(r#"{{"kind":"error","message":"{}"}}"#, e))
    }

    fn render_text(&self, output: &Output) -> String {
        match output {
            Output::Path { path, .. } => path.display().to_string(),
            Output::Presence { present, .. } => present.to_string(),
            Output::Stored { key, bytes } => format!("stored {} ({} bytes)", key, bytes),
            Output::Key { key, .. } => key.clone(),
            Output::Sweep(report) => format!(
                "removed {} of {} entries ({} directories skipped)",
                report.removed, report.scanned, report.skipped_dirs
            ),
            Output::Entries { entries, .. } => entries
                .iter()
                .map(|e| {
                    format!(
                        "{}\t{}\t{}\t{}",
                        e.key,
                        e.size,
                        e.modified,
                        if e.expired { "expired" } else { "fresh" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}
