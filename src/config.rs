//! Configuration for pollwatch
//!
//! A [`WatchConfig`] is captured when a watcher is built and never changes
//! afterwards. It can be assembled in code, loaded from a TOML file and
//! overridden from the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use crate::error::{Result, WatchError};
use crate::filter::PathFilter;
use crate::fs::{Filesystem, LocalFilesystem};

/// Polling interval used when none is configured
pub const DEFAULT_INTERVAL_MS: u64 = 10_000;

bitflags! {
    /// Event kinds a watcher reports.
    ///
    /// Each diff pass only runs when its kind is present, so a disabled kind
    /// is never reported and costs no filesystem reads.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EventMask: u32 {
        const CREATED = 1;
        const DELETED = 2;
        const DATE_MODIFIED = 4;
        const SIZE_MODIFIED = 8;

        /// Either modification kind.
        const MODIFIED = Self::DATE_MODIFIED.bits() | Self::SIZE_MODIFIED.bits();

        const ALL = Self::CREATED.bits() | Self::DELETED.bits() | Self::MODIFIED.bits();
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::ALL
    }
}

impl FromStr for EventMask {
    type Err = String;

    /// Parses a comma separated list such as `created,size_modified`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut mask = EventMask::empty();
        for name in s.split(|c| c == ',' || c == '|').map(str::trim).filter(|n| !n.is_empty()) {
            let flag = match name.to_ascii_lowercase().replace('-', "_").as_str() {
                "created" | "create" => EventMask::CREATED,
                "deleted" | "delete" => EventMask::DELETED,
                "date_modified" | "date" => EventMask::DATE_MODIFIED,
                "size_modified" | "size" => EventMask::SIZE_MODIFIED,
                "modified" => EventMask::MODIFIED,
                "all" => EventMask::ALL,
                "none" => EventMask::empty(),
                _ => return Err(format!("Unknown event kind: {}", name)),
            };
            mask |= flag;
        }
        Ok(mask)
    }
}

/// Polarity of the filter pattern set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Only paths matching a pattern are watched.
    #[default]
    Include,
    /// Paths matching a pattern are never watched.
    Exclude,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Include => write!(f, "include"),
            FilterMode::Exclude => write!(f, "exclude"),
        }
    }
}

/// Configuration of a single watcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Directory to watch
    pub root: PathBuf,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Time between ticks in milliseconds
    pub interval_ms: u64,
    /// Event kinds to report. An empty mask means all kinds.
    pub events: EventMask,
    /// Regular expressions matched against each path
    pub filters: Vec<String>,
    /// Whether `filters` is an allow-list or a deny-list
    pub filter_mode: FilterMode,
    /// Deliver the baseline as a batch of `Initial` events on start
    pub emit_initial: bool,
    /// Skip paths excluded by .gitignore/.ignore files and hidden files
    pub respect_ignore_files: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: false,
            interval_ms: DEFAULT_INTERVAL_MS,
            events: EventMask::ALL,
            filters: Vec::new(),
            filter_mode: FilterMode::Include,
            emit_initial: false,
            respect_ignore_files: false,
        }
    }
}

impl WatchConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_events(mut self, events: EventMask) -> Self {
        self.events = events;
        self
    }

    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter_mode(mut self, filter_mode: FilterMode) -> Self {
        self.filter_mode = filter_mode;
        self
    }

    pub fn with_emit_initial(mut self, emit_initial: bool) -> Self {
        self.emit_initial = emit_initial;
        self
    }

    pub fn with_respect_ignore_files(mut self, respect: bool) -> Self {
        self.respect_ignore_files = respect;
        self
    }

    /// Get polling interval duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Event mask with an empty mask widened to `ALL`
    pub fn effective_events(&self) -> EventMask {
        if self.events.is_empty() {
            EventMask::ALL
        } else {
            self.events
        }
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| WatchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `POLLWATCH_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from `POLLWATCH_*` variables resolved by `lookup`
    pub fn apply_overrides<L>(&mut self, lookup: L)
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("POLLWATCH_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(ms) => self.interval_ms = ms,
                Err(_) => tracing::warn!("Ignoring POLLWATCH_INTERVAL_MS={}", val),
            }
        }

        if let Some(val) = lookup("POLLWATCH_RECURSIVE") {
            match val.parse::<bool>() {
                Ok(recursive) => self.recursive = recursive,
                Err(_) => tracing::warn!("Ignoring POLLWATCH_RECURSIVE={}", val),
            }
        }

        if let Some(val) = lookup("POLLWATCH_EVENTS") {
            match val.parse::<EventMask>() {
                Ok(events) => self.events = events,
                Err(err) => tracing::warn!("Ignoring POLLWATCH_EVENTS: {}", err),
            }
        }
    }

    /// Validate configuration values.
    ///
    /// Checks the interval, the root directory and every filter pattern.
    pub fn validate(&self) -> Result<()> {
        self.checked_filter(&LocalFilesystem::new()).map(|_| ())
    }

    /// Validate against `fs` and return the compiled filter
    pub(crate) fn checked_filter<F: Filesystem>(&self, fs: &F) -> Result<PathFilter> {
        if self.interval_ms == 0 {
            return Err(WatchError::InvalidInterval);
        }

        if !fs.is_dir(&self.root) {
            return Err(WatchError::InvalidRoot(self.root.clone()));
        }

        PathFilter::from_config(self)
    }
}
