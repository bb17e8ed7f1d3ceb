use std::path::Path;
use regex::Regex;
use crate::config::{FilterMode, WatchConfig};
use crate::error::{Result, WatchError};

/// Decides whether a discovered path is watched.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<Regex>,
    mode: FilterMode,
}

impl PathFilter {
    /// Compile `patterns`. Fails on the first invalid pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S], mode: FilterMode) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| WatchError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns, mode })
    }

    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        Self::new(&config.filters, config.filter_mode)
    }

    /// Filter that accepts every path
    pub fn accept_all() -> Self {
        Self {
            patterns: Vec::new(),
            mode: FilterMode::Include,
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn accepts<P: AsRef<Path>>(&self, path: P) -> bool {
        if self.patterns.is_empty() {
            return true;
        }

        let path = path.as_ref().to_string_lossy();
        let matched_any = self.patterns.iter().any(|re| re.is_match(&path));

        match self.mode {
            FilterMode::Include => matched_any,
            FilterMode::Exclude => !matched_any,
        }
    }
}
