pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod filter;
pub mod fs;
mod snapshot;
pub mod watcher;

pub use config::{EventMask, FilterMode, WatchConfig, DEFAULT_INTERVAL_MS};
pub use diff::DiffEngine;
pub use error::{Result, WatchError};
pub use events::*;
pub use filter::PathFilter;
pub use fs::{Filesystem, LocalFilesystem};
pub use watcher::*;
