//! CLI module - Command-line interface definitions and handlers

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use httpcache::core::render::{Output, OutputFormat, RenderConfig, Renderer};
use httpcache::core::util::{generate_key_with, HashAlgorithm};
use httpcache::{CacheSettings, FileCache};

/// httpcache - inspect and maintain a TTL-governed blob cache.
#[derive(Parser, Debug)]
#[command(name = "httpcache")]
#[command(
    author,
    version,
    about,
    long_about = r#"httpcache manages a flat directory of cached blobs, one file per key.

An entry's file modification time is its last access. Reading an entry
refreshes it; entries unused for longer than the TTL are removed by sweeps.
Every command ends with a sweep using the configured TTL (skipped when the
TTL is zero or negative).

Examples:
    httpcache set channel.json --input channel.json
    httpcache get channel.json > out.json
    httpcache clear --max-age 3600
    httpcache list --format json
"#
)]
pub struct Cli {
    /// Cache directory.
    #[arg(
        long,
        global = true,
        env = "HTTPCACHE_DIR",
        value_name = "DIR",
        long_help = "Directory holding cache entries. Created (with parents) if missing.\n\n\
Defaults to the settings file's cache_dir, then to <platform cache dir>/httpcache/http_cache."
    )]
    pub dir: Option<PathBuf>,

    /// Entry lifetime in seconds.
    #[arg(
        long,
        global = true,
        env = "HTTPCACHE_TTL",
        value_name = "SECONDS",
        allow_negative_numbers = true,
        long_help = "Seconds an unused entry stays valid. Zero or negative disables the\n\
sweep that runs when a command finishes.\n\n\
Defaults to the settings file's http_cache_length, then to 604800 (one week)."
    )]
    pub ttl: Option<i64>,

    /// JSON settings file.
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        long_help = "Read http_cache_length and cache_dir from a JSON settings file.\n\
Command-line flags and environment variables take precedence."
    )]
    pub config: Option<PathBuf>,

    /// Output format (text/json).
    #[arg(long, global = true, default_value = "text", value_name = "FORMAT")]
    pub format: String,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Quiet mode (errors only on stderr).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug diagnostics on stderr).
    #[arg(
        short,
        long,
        global = true,
        long_help = "Enable debug diagnostics on stderr. RUST_LOG overrides this when set."
    )]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Cache(CacheCommands),

    /// Derive a cache key from a URL.
    #[command(
        long_about = "Print the cache key for URL: the hex digest of the URL followed by --suffix.\n\n\
Example:\n\
  httpcache key https://packagecontrol.io/channel_v3.json --suffix .info\n"
    )]
    Key {
        #[arg(value_name = "URL")]
        url: String,

        /// Suffix appended to the digest.
        #[arg(long, default_value = "", value_name = "SUFFIX")]
        suffix: String,

        /// Digest algorithm (sha1/xxh3).
        #[arg(long, default_value = "sha1", value_name = "ALGORITHM")]
        algorithm: String,
    },
}

/// Commands that operate on the cache directory
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Print an entry's content and refresh its timestamp.
    #[command(
        long_about = "Write the raw bytes of KEY to stdout (or --output) and refresh the entry's\n\
modification time. Exits with an error on a cache miss.\n\n\
Example:\n\
  httpcache get channel.json > channel.json\n"
    )]
    Get {
        #[arg(value_name = "KEY")]
        key: String,

        /// Write content to this file instead of stdout.
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Store an entry, replacing previous content.
    #[command(
        long_about = "Store bytes under KEY. Content is read from --input or stdin.\n\n\
Examples:\n\
  httpcache set channel.json --input channel.json\n\
  curl -s https://example.com | httpcache set example\n"
    )]
    Set {
        #[arg(value_name = "KEY")]
        key: String,

        /// Read content from this file instead of stdin.
        #[arg(long, short, value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Check whether an entry exists (exit status 1 if absent).
    Has {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print the filesystem path backing an entry.
    Path {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Remove entries unused for at least the given TTL.
    #[command(
        long_about = "Sweep the cache directory and delete every file whose age is at least\n\
--max-age seconds (defaults to the configured TTL). Subdirectories are left untouched.\n\n\
Example:\n\
  httpcache clear --max-age 0\n"
    )]
    Clear {
        /// Staleness threshold for this sweep.
        #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
        max_age: Option<i64>,
    },

    /// List entries with size, last access and expiry state.
    List,
}

/// Resolve settings from the config file and command-line overrides
fn resolve_settings(
    config: Option<&Path>,
    dir: Option<PathBuf>,
    ttl: Option<i64>,
) -> Result<CacheSettings> {
    let mut settings = match config {
        Some(path) => CacheSettings::load(path)?,
        None => CacheSettings::default(),
    };
    if dir.is_some() {
        settings.cache_dir = dir;
    }
    if let Some(ttl) = ttl {
        settings.http_cache_length = ttl;
    }
    Ok(settings)
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let format: OutputFormat = cli.format.parse().unwrap_or_default();
    let renderer = Renderer::with_config(RenderConfig::with_pretty(format, cli.pretty));

    match cli.command {
        Commands::Key {
            url,
            suffix,
            algorithm,
        } => run_key(url, &suffix, &algorithm, &renderer),
        Commands::Cache(command) => {
            let settings = resolve_settings(cli.config.as_deref(), cli.dir, cli.ttl)?;
            run_cache(&settings, command, &renderer)
        }
    }
}

fn run_key(url: String, suffix: &str, algorithm: &str, renderer: &Renderer) -> Result<()> {
    let algorithm: HashAlgorithm = algorithm.parse().map_err(anyhow::Error::msg)?;
    let key = generate_key_with(&url, suffix, algorithm);
    println!("{}", renderer.render(&Output::Key { url, key }));
    Ok(())
}

/// Open the cache, run one command against it and sweep on the way out
fn run_cache(settings: &CacheSettings, command: CacheCommands, renderer: &Renderer) -> Result<()> {
    let cache = settings
        .open_always()
        .with_context(|| format!("Failed to open cache at {}", settings.dir().display()))?;
    debug!(dir = %cache.base_path().display(), ttl = cache.ttl(), "Using cache");

    let result = run_command(&cache, command, renderer);

    match cache.close() {
        Ok(report) if report.removed > 0 => {
            debug!(removed = report.removed, "Swept stale entries on exit");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Cache sweep failed"),
    }

    match result? {
        ExitState::Success => Ok(()),
        ExitState::Absent => std::process::exit(1),
    }
}

enum ExitState {
    Success,
    Absent,
}

fn run_command(
    cache: &FileCache,
    command: CacheCommands,
    renderer: &Renderer,
) -> Result<ExitState> {
    match command {
        CacheCommands::Get { key, output } => {
            let Some(content) = cache.get(&key)? else {
                bail!("cache miss: {}", key);
            };
            match output {
                Some(path) => fs::write(&path, &content)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&content)?;
                    stdout.flush()?;
                }
            }
        }

        CacheCommands::Set { key, input } => {
            let content = match input {
                Some(path) => {
                    fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?
                }
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin()
                        .read_to_end(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            cache.set(&key, &content)?;
            println!(
                "{}",
                renderer.render(&Output::Stored {
                    key,
                    bytes: content.len()
                })
            );
        }

        CacheCommands::Has { key } => {
            let present = cache.has(&key);
            println!("{}", renderer.render(&Output::Presence { key, present }));
            if !present {
                return Ok(ExitState::Absent);
            }
        }

        CacheCommands::Path { key } => {
            let path = cache.path(&key)?;
            println!("{}", renderer.render(&Output::Path { key, path }));
        }

        CacheCommands::Clear { max_age } => {
            let report = cache.clear(max_age.unwrap_or(cache.ttl()))?;
            println!("{}", renderer.render(&Output::Sweep(report)));
        }

        CacheCommands::List => {
            let ttl = cache.ttl();
            let entries = cache.entries(ttl)?;
            println!("{}", renderer.render(&Output::Entries { ttl, entries }));
        }
    }

    Ok(ExitState::Success)
}
