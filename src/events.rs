use std::path::{Path, PathBuf};
use std::time::SystemTime;
use serde::{Deserialize, Serialize};
use crate::config::EventMask;

/// Kind of change reported for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Synthetic entry of the initial snapshot batch. Never produced by a diff.
    Initial,
    Created,
    Deleted,
    DateModified,
    SizeModified,
}

impl ChangeKind {
    /// Mask bit gating this kind, `None` for `Initial`.
    pub fn mask_bit(self) -> Option<EventMask> {
        match self {
            ChangeKind::Initial => None,
            ChangeKind::Created => Some(EventMask::CREATED),
            ChangeKind::Deleted => Some(EventMask::DELETED),
            ChangeKind::DateModified => Some(EventMask::DATE_MODIFIED),
            ChangeKind::SizeModified => Some(EventMask::SIZE_MODIFIED),
        }
    }

    pub fn is_modification(self) -> bool {
        matches!(self, ChangeKind::DateModified | ChangeKind::SizeModified)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChangeKind::Initial => "INITIAL",
            ChangeKind::Created => "CREATED",
            ChangeKind::Deleted => "DELETED",
            ChangeKind::DateModified => "DATE_MODIFIED",
            ChangeKind::SizeModified => "SIZE_MODIFIED",
        }
    }

    pub fn short_code(self) -> char {
        match self {
            ChangeKind::Initial => 'I',
            ChangeKind::Created => 'C',
            ChangeKind::Deleted => 'D',
            ChangeKind::DateModified => 'T',
            ChangeKind::SizeModified => 'S',
        }
    }
}

/// Last observed state of a watched file. The path is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl FileRecord {
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self { path, size, modified }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: FileRecord,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: FileRecord) -> Self {
        Self { kind, record }
    }

    pub fn path(&self) -> &Path {
        &self.record.path
    }
}
