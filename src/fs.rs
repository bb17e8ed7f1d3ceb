//! Filesystem access used by the diff engine
//!
//! Enumeration and metadata probes sit behind [`Filesystem`] so the engine
//! can be driven against the local disk or any other source of files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use ignore::WalkBuilder;

/// Capabilities the diff engine needs from a filesystem.
///
/// Metadata reads may fail when a file disappears between enumeration and
/// the read; callers treat such failures as transient.
pub trait Filesystem: Send + 'static {
    /// Files under `root`, descending into subdirectories when `recursive`.
    fn list_files(&self, root: &Path, recursive: bool) -> Vec<PathBuf>;

    /// Length in bytes, read through an open handle.
    fn size(&self, path: &Path) -> io::Result<u64>;

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime>;

    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` can serve as a watch root.
    fn is_dir(&self, path: &Path) -> bool;
}

/// The local disk.
#[derive(Debug, Clone, Default)]
pub struct LocalFilesystem {
    respect_ignore_files: bool,
}

impl LocalFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip hidden files and anything excluded by .gitignore/.ignore files
    pub fn respecting_ignore_files(mut self, respect: bool) -> Self {
        self.respect_ignore_files = respect;
        self
    }

    fn walker(&self, root: &Path, recursive: bool) -> WalkBuilder {
        let mut builder = WalkBuilder::new(root);
        if self.respect_ignore_files {
            builder
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .ignore(true)
                .parents(true);
        } else {
            builder.standard_filters(false);
        }
        if !recursive {
            builder.max_depth(Some(1));
        }
        builder
    }
}

impl Filesystem for LocalFilesystem {
    fn list_files(&self, root: &Path, recursive: bool) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for result in self.walker(root, recursive).build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().map_or(false, |ft| ft.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(err) => {
                    tracing::warn!("Error walking directory: {}", err);
                }
            }
        }

        files
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(File::open(path)?.metadata()?.len())
    }

    fn last_modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
