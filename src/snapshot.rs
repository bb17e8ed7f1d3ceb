use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::events::FileRecord;
use crate::filter::PathFilter;
use crate::fs::Filesystem;

/// Files known as of the previous tick, keyed by path.
///
/// Owned by a single [`DiffEngine`](crate::DiffEngine); nothing outside the
/// engine gets a handle to it.
#[derive(Debug, Default)]
pub(crate) struct SnapshotStore {
    records: BTreeMap<PathBuf, FileRecord>,
}

impl SnapshotStore {
    /// Record every accepted file under `root` with its current size and
    /// modification time. Files whose metadata cannot be read are left out.
    pub(crate) fn build<F: Filesystem>(fs: &F, root: &Path, recursive: bool, filter: &PathFilter) -> Self {
        let mut store = Self::default();

        for path in fs.list_files(root, recursive) {
            if !filter.accepts(&path) {
                continue;
            }
            match read_record(fs, &path) {
                Some(record) => store.insert(record),
                None => tracing::trace!("Skipping unreadable file in baseline: {}", path.display()),
            }
        }

        store
    }

    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(path)
    }

    pub(crate) fn insert(&mut self, record: FileRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut FileRecord> {
        self.records.values_mut()
    }

    /// Drop every record for which `keep` returns false, handing each removed
    /// record to `removed`. Every record is visited exactly once.
    pub(crate) fn retain_or_evict<K, R>(&mut self, mut keep: K, mut removed: R)
    where
        K: FnMut(&FileRecord) -> bool,
        R: FnMut(&FileRecord),
    {
        self.records.retain(|_, record| {
            let retain = keep(record);
            if !retain {
                removed(record);
            }
            retain
        });
    }
}

/// Current size and modification time of `path`, `None` if either read fails.
pub(crate) fn read_record<F: Filesystem>(fs: &F, path: &Path) -> Option<FileRecord> {
    let size = fs.size(path).ok()?;
    let modified = fs.last_modified(path).ok()?;
    Some(FileRecord::new(path.to_path_buf(), size, modified))
}
