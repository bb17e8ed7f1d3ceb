use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crate::config::{EventMask, FilterMode, WatchConfig};

#[derive(Parser)]
#[command(name = "pollwatch")]
#[command(author = "PollWatch Team")]
#[command(version = "0.1.0")]
#[command(about = "Watch a directory by polling and print created, deleted and modified files")]
#[command(long_about = "PollWatch snapshots a directory and compares it against a fresh scan on every interval. It reports files that were created, deleted, or modified by timestamp or size, without relying on OS change notifications.")]
pub struct Cli {
    /// Directory to watch for changes
    #[arg(value_name = "PATH", help = "Path to watch (defaults to current directory)")]
    pub path: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long, help = "Watch subdirectories too")]
    pub recursive: bool,

    /// Polling interval in milliseconds
    #[arg(short, long, help = "Polling interval in ms [default: 10000]")]
    pub interval: Option<u64>,

    /// Event kinds to report
    #[arg(long, help = "Event kinds to report (e.g. created,deleted,modified)")]
    pub events: Option<EventMask>,

    /// Regex filters applied to each path
    #[arg(long = "filter", value_name = "REGEX", help = "Only watch paths matching this regex (repeatable)")]
    pub filters: Vec<String>,

    /// Turn the filters into a deny-list
    #[arg(long, help = "Ignore paths matching --filter instead of keeping them")]
    pub exclude: bool,

    /// Print the starting snapshot
    #[arg(long, help = "Report every existing file once on startup")]
    pub initial: bool,

    /// Honour .gitignore and hidden files
    #[arg(long, help = "Skip hidden files and paths excluded by .gitignore/.ignore")]
    pub respect_ignore: bool,

    /// Configuration file
    #[arg(short, long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", help = "Output format")]
    pub output: OutputFormat,

    /// Disable colors in output
    #[arg(long, help = "Disable colored output")]
    pub no_color: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output (default)
    Text,
    /// One JSON event per line
    Json,
    /// Compact single-line format
    Compact,
}

impl Cli {
    pub fn get_watch_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }

    /// Build the watcher configuration.
    ///
    /// Precedence, lowest first: defaults or `--config` file, `POLLWATCH_*`
    /// environment variables, command line flags.
    pub fn watch_config(&self) -> Result<WatchConfig> {
        let mut config = match &self.config {
            Some(path) => WatchConfig::load(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => WatchConfig::default(),
        };
        config.apply_env();

        if self.path.is_some() || self.config.is_none() {
            config.root = self.get_watch_path();
        }
        if self.recursive {
            config.recursive = true;
        }
        if let Some(interval) = self.interval {
            config.interval_ms = interval;
        }
        if let Some(events) = self.events {
            config.events = events;
        }
        if !self.filters.is_empty() {
            config.filters = self.filters.clone();
        }
        if self.exclude {
            config.filter_mode = FilterMode::Exclude;
        }
        if self.initial {
            config.emit_initial = true;
        }
        if self.respect_ignore {
            config.respect_ignore_files = true;
        }

        config.validate().context("Invalid watch configuration")?;
        Ok(config)
    }

    pub fn setup_logging(&self) {
        let level = if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
