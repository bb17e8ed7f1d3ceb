//! Snapshot diffing
//!
//! [`DiffEngine`] keeps the baseline of known files and reconciles it against
//! a fresh scan on every [`tick`](DiffEngine::tick). A tick runs three passes
//! in a fixed order, each gated by the event mask:
//!
//! 1. created: listed paths missing from the store are read and added
//! 2. deleted: stored paths that no longer exist are removed
//! 3. modified: surviving records are compared by timestamp, then by size
//!
//! Later passes see the mutations of earlier ones, so one path shows up at
//! most once in a batch. Metadata reads that fail are treated as "no change
//! this tick"; the deleted pass of a later tick reconciles vanished files.

use std::path::{Path, PathBuf};
use crate::config::{EventMask, WatchConfig};
use crate::error::Result;
use crate::events::{ChangeEvent, ChangeKind};
use crate::filter::PathFilter;
use crate::fs::Filesystem;
use crate::snapshot::{read_record, SnapshotStore};

pub struct DiffEngine<F: Filesystem> {
    fs: F,
    root: PathBuf,
    recursive: bool,
    events: EventMask,
    filter: PathFilter,
    store: SnapshotStore,
}

impl<F: Filesystem> DiffEngine<F> {
    /// Build the baseline for `config.root`. Files present now never produce
    /// a `Created` event.
    pub fn new(fs: F, config: &WatchConfig) -> Result<Self> {
        let filter = PathFilter::from_config(config)?;
        Ok(Self::with_filter(fs, config, filter))
    }

    pub(crate) fn with_filter(fs: F, config: &WatchConfig, filter: PathFilter) -> Self {
        let store = SnapshotStore::build(&fs, &config.root, config.recursive, &filter);
        tracing::debug!(
            "Baseline of {} holds {} files",
            config.root.display(),
            store.len()
        );

        Self {
            fs,
            root: config.root.clone(),
            recursive: config.recursive,
            events: config.effective_events(),
            filter,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of files currently tracked
    pub fn known_files(&self) -> usize {
        self.store.len()
    }

    /// One `Initial` event per tracked file, in path order
    pub fn baseline_events(&self) -> Vec<ChangeEvent> {
        self.store
            .records()
            .map(|record| ChangeEvent::new(ChangeKind::Initial, record.clone()))
            .collect()
    }

    /// Run the created, deleted and modified passes and return the batch in
    /// that order.
    pub fn tick(&mut self) -> Vec<ChangeEvent> {
        let mut batch = Vec::new();

        if self.events.contains(EventMask::CREATED) {
            self.created_pass(&mut batch);
        }
        if self.events.contains(EventMask::DELETED) {
            self.deleted_pass(&mut batch);
        }
        if self.events.intersects(EventMask::MODIFIED) {
            self.modified_pass(&mut batch);
        }

        batch
    }

    fn created_pass(&mut self, batch: &mut Vec<ChangeEvent>) {
        for path in self.fs.list_files(&self.root, self.recursive) {
            if self.store.contains(&path) || !self.filter.accepts(&path) {
                continue;
            }

            match read_record(&self.fs, &path) {
                Some(record) => {
                    self.store.insert(record.clone());
                    batch.push(ChangeEvent::new(ChangeKind::Created, record));
                }
                // Vanished or unreadable since listing; retried next tick.
                None => tracing::trace!("Could not read new file {}", path.display()),
            }
        }
    }

    fn deleted_pass(&mut self, batch: &mut Vec<ChangeEvent>) {
        let fs = &self.fs;
        self.store.retain_or_evict(
            |record| fs.exists(&record.path),
            |record| batch.push(ChangeEvent::new(ChangeKind::Deleted, record.clone())),
        );
    }

    fn modified_pass(&mut self, batch: &mut Vec<ChangeEvent>) {
        let check_date = self.events.contains(EventMask::DATE_MODIFIED);
        let check_size = self.events.contains(EventMask::SIZE_MODIFIED);

        for record in self.store.records_mut() {
            if check_date {
                let modified = match self.fs.last_modified(&record.path) {
                    Ok(modified) => modified,
                    Err(err) => {
                        tracing::trace!("Could not stat {}: {}", record.path.display(), err);
                        continue;
                    }
                };

                if modified != record.modified {
                    record.modified = modified;
                    // No size comparison this tick, but the stored size stays current
                    if check_size {
                        if let Ok(size) = self.fs.size(&record.path) {
                            record.size = size;
                        }
                    }
                    batch.push(ChangeEvent::new(ChangeKind::DateModified, record.clone()));
                    continue;
                }
            }

            if check_size {
                match self.fs.size(&record.path) {
                    Ok(size) if size != record.size => {
                        record.size = size;
                        batch.push(ChangeEvent::new(ChangeKind::SizeModified, record.clone()));
                    }
                    Ok(_) => {}
                    Err(err) => tracing::trace!("Could not open {}: {}", record.path.display(), err),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterMode;
    use crate::fs::memory::MemoryFilesystem;
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn engine(fs: &MemoryFilesystem, config: WatchConfig) -> DiffEngine<MemoryFilesystem> {
        DiffEngine::new(fs.clone(), &config).expect("Failed to build engine")
    }

    fn kinds(batch: &[ChangeEvent]) -> Vec<(ChangeKind, String)> {
        batch
            .iter()
            .map(|e| (e.kind, e.path().to_string_lossy().into_owned()))
            .collect()
    }

    #[test]
    fn test_unchanged_tree_yields_empty_batches() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        fs.write("/w/b.txt", 200, at(1));

        let mut engine = engine(&fs, WatchConfig::new("/w"));

        assert!(engine.tick().is_empty());
        assert!(engine.tick().is_empty());
        assert_eq!(engine.known_files(), 2);
    }

    #[test]
    fn test_change_sequence() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        fs.write("/w/b.txt", 200, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        assert!(engine.tick().is_empty());

        fs.write("/w/c.txt", 10, at(2));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::Created, "/w/c.txt".into())]);

        fs.remove("/w/a.txt");
        let batch = engine.tick();
        assert_eq!(kinds(&batch), vec![(ChangeKind::Deleted, "/w/a.txt".into())]);
        assert_eq!(batch[0].record.size, 100);

        fs.write("/w/b.txt", 250, at(3));
        let batch = engine.tick();
        assert_eq!(kinds(&batch), vec![(ChangeKind::DateModified, "/w/b.txt".into())]);
        assert_eq!(batch[0].record.modified, at(3));

        assert!(engine.tick().is_empty());
    }

    #[test]
    fn test_size_change_without_timestamp_change() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.write("/w/a.txt", 150, at(1));
        let batch = engine.tick();

        assert_eq!(kinds(&batch), vec![(ChangeKind::SizeModified, "/w/a.txt".into())]);
        assert_eq!(batch[0].record.size, 150);
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn test_size_reported_when_dates_disabled() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let config = WatchConfig::new("/w").with_events(EventMask::SIZE_MODIFIED);
        let mut engine = engine(&fs, config);

        fs.write("/w/a.txt", 101, at(2));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::SizeModified, "/w/a.txt".into())]);

        // Timestamp-only change is invisible without DATE_MODIFIED
        fs.write("/w/a.txt", 101, at(3));
        assert!(engine.tick().is_empty());
    }

    #[test]
    fn test_date_only_mask_never_opens_file() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let config = WatchConfig::new("/w").with_events(EventMask::DATE_MODIFIED);
        let mut engine = engine(&fs, config);

        fs.write("/w/a.txt", 500, at(2));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::DateModified, "/w/a.txt".into())]);
        // Baseline reads the size once; the date-only tick never opens the file
        assert_eq!(fs.size_reads(), 1);
    }

    #[test]
    fn test_date_change_with_both_kinds_refreshes_size_once() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w").with_events(EventMask::MODIFIED));
        assert_eq!(fs.size_reads(), 1);

        fs.write("/w/a.txt", 500, at(2));
        let batch = engine.tick();
        assert_eq!(kinds(&batch), vec![(ChangeKind::DateModified, "/w/a.txt".into())]);
        assert_eq!(batch[0].record.size, 500);
        // One read to keep the stored size current, no separate size comparison
        assert_eq!(fs.size_reads(), 2);

        // Unchanged date falls through to the size check
        assert!(engine.tick().is_empty());
        assert_eq!(fs.size_reads(), 3);
    }

    #[test]
    fn test_delete_then_recreate_across_ticks() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.remove("/w/a.txt");
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::Deleted, "/w/a.txt".into())]);

        fs.write("/w/a.txt", 100, at(1));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::Created, "/w/a.txt".into())]);
    }

    #[test]
    fn test_recreate_within_one_interval_is_not_created() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 100, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.remove("/w/a.txt");
        fs.write("/w/a.txt", 100, at(1));
        assert!(engine.tick().is_empty());

        fs.remove("/w/a.txt");
        fs.write("/w/a.txt", 3, at(9));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::DateModified, "/w/a.txt".into())]);
    }

    #[test]
    fn test_each_path_at_most_once_per_batch() {
        let fs = MemoryFilesystem::new();
        for i in 0..20 {
            fs.write(&format!("/w/f{:02}", i), i, at(1));
        }
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        for i in 0..20 {
            let name = format!("/w/f{:02}", i);
            match i % 4 {
                0 => fs.remove(&name),
                1 => fs.write(&name, i + 1, at(2)),
                2 => fs.write(&name, i + 1, at(1)),
                _ => {}
            }
            fs.write(&format!("/w/new{:02}", i), 1, at(2));
        }

        let batch = engine.tick();
        let unique: HashSet<_> = batch.iter().map(|e| e.path().to_path_buf()).collect();
        assert_eq!(unique.len(), batch.len());
        assert_eq!(batch.len(), 20 + 5 + 5 + 5);
    }

    #[test]
    fn test_batch_ordered_by_pass() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 1, at(1));
        fs.write("/w/b.txt", 1, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.write("/w/a.txt", 2, at(2));
        fs.remove("/w/b.txt");
        fs.write("/w/c.txt", 1, at(2));

        let order: Vec<ChangeKind> = engine.tick().iter().map(|e| e.kind).collect();
        assert_eq!(
            order,
            vec![ChangeKind::Created, ChangeKind::Deleted, ChangeKind::DateModified]
        );
    }

    #[test]
    fn test_disabled_kinds_never_reported() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 1, at(1));
        fs.write("/w/b.txt", 1, at(1));
        let config = WatchConfig::new("/w").with_events(EventMask::DELETED);
        let mut engine = engine(&fs, config);

        fs.write("/w/a.txt", 2, at(2));
        fs.write("/w/c.txt", 1, at(2));
        fs.remove("/w/b.txt");

        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::Deleted, "/w/b.txt".into())]);
        // The created pass never ran, so c.txt is not tracked
        assert_eq!(engine.known_files(), 1);
    }

    #[test]
    fn test_empty_mask_reports_everything() {
        let fs = MemoryFilesystem::new();
        let config = WatchConfig::new("/w").with_events(EventMask::empty());
        let mut engine = engine(&fs, config);

        fs.write("/w/a.txt", 1, at(1));
        assert_eq!(kinds(&engine.tick()), vec![(ChangeKind::Created, "/w/a.txt".into())]);
    }

    #[test]
    fn test_unreadable_new_file_is_retried() {
        let fs = MemoryFilesystem::new();
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.write("/w/a.txt", 1, at(1));
        fs.make_unreadable("/w/a.txt");
        assert!(engine.tick().is_empty());
        assert_eq!(engine.known_files(), 0);
    }

    #[test]
    fn test_unreadable_known_file_is_not_modified() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/a.txt", 1, at(1));
        let mut engine = engine(&fs, WatchConfig::new("/w"));

        fs.write("/w/a.txt", 2, at(2));
        fs.make_unreadable("/w/a.txt");
        assert!(engine.tick().is_empty());
        assert_eq!(engine.known_files(), 1);
    }

    #[test]
    fn test_filter_polarity() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/skip.json", 1, at(1));
        fs.write("/w/a.txt", 1, at(1));

        let include = WatchConfig::new("/w").with_filters([r"skip\.json$"]);
        let mut allow = engine(&fs, include);
        let exclude = WatchConfig::new("/w")
            .with_filters([r"skip\.json$"])
            .with_filter_mode(FilterMode::Exclude);
        let mut deny = engine(&fs, exclude);

        assert_eq!(allow.known_files(), 1);
        assert_eq!(deny.known_files(), 1);

        fs.write("/w/skip.json", 2, at(2));
        fs.write("/w/a.txt", 2, at(2));

        assert_eq!(kinds(&allow.tick()), vec![(ChangeKind::DateModified, "/w/skip.json".into())]);
        assert_eq!(kinds(&deny.tick()), vec![(ChangeKind::DateModified, "/w/a.txt".into())]);

        fs.remove("/w/skip.json");
        assert_eq!(kinds(&allow.tick()), vec![(ChangeKind::Deleted, "/w/skip.json".into())]);
        assert!(deny.tick().is_empty());
    }

    #[test]
    fn test_baseline_events_are_initial() {
        let fs = MemoryFilesystem::new();
        fs.write("/w/b.txt", 200, at(1));
        fs.write("/w/a.txt", 100, at(1));
        let engine = engine(&fs, WatchConfig::new("/w"));

        let initial = engine.baseline_events();

        assert_eq!(
            kinds(&initial),
            vec![
                (ChangeKind::Initial, "/w/a.txt".into()),
                (ChangeKind::Initial, "/w/b.txt".into()),
            ]
        );
        assert_eq!(initial[1].record.size, 200);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let fs = MemoryFilesystem::new();
        let config = WatchConfig::new("/w").with_filters(["(oops"]);
        assert!(DiffEngine::new(fs, &config).is_err());
    }
}
