//! Working tree file status.

use crate::diff::Diff;
use crate::patch::{self, PatchError};
use crate::selection::{DiffSelection, InitialSelection};
use std::fmt;

/// How a file differs between the index and the working tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
    Renamed { old_path: String },
    Copied { old_path: String },
    Conflicted,
    Untracked,
}

impl FileStatus {
    /// Map a two letter `git status --porcelain` code.
    ///
    /// Renames and copies need the original path; without one they are
    /// reported as modified.
    pub fn from_porcelain(xy: &str, old_path: Option<&str>) -> Self {
        let conflicted = xy.contains('U') || xy == "AA" || xy == "DD";
        match (xy, old_path) {
            ("??", _) => FileStatus::Untracked,
            _ if conflicted => FileStatus::Conflicted,
            (code, Some(old)) if code.contains('R') => FileStatus::Renamed {
                old_path: old.to_string(),
            },
            (code, Some(old)) if code.contains('C') => FileStatus::Copied {
                old_path: old.to_string(),
            },
            (code, _) if code.contains('A') => FileStatus::New,
            (code, _) if code.contains('D') => FileStatus::Deleted,
            _ => FileStatus::Modified,
        }
    }

    /// Path the file had before the change, for renames and copies
    pub fn old_path(&self) -> Option<&str> {
        match self {
            FileStatus::Renamed { old_path } | FileStatus::Copied { old_path } => Some(old_path),
            FileStatus::New
            | FileStatus::Modified
            | FileStatus::Deleted
            | FileStatus::Conflicted
            | FileStatus::Untracked => None,
        }
    }

    /// Whether the file has no previous version
    pub fn is_new(&self) -> bool {
        matches!(self, FileStatus::New | FileStatus::Untracked)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::New => f.write_str("new"),
            FileStatus::Modified => f.write_str("modified"),
            FileStatus::Deleted => f.write_str("deleted"),
            FileStatus::Renamed { old_path } => write!(f, "renamed from {}", old_path),
            FileStatus::Copied { old_path } => write!(f, "copied from {}", old_path),
            FileStatus::Conflicted => f.write_str("conflicted"),
            FileStatus::Untracked => f.write_str("untracked"),
        }
    }
}

/// A changed file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
}

impl FileChange {
    pub fn new(path: impl Into<String>, status: FileStatus) -> Self {
        Self {
            path: path.into(),
            status,
        }
    }
}

/// A changed file in the working tree together with the lines chosen for
/// the next commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingFileChange {
    pub file: FileChange,
    pub selection: DiffSelection,
}

impl WorkingFileChange {
    /// Start with every line selected
    pub fn new(file: FileChange) -> Self {
        Self {
            file,
            selection: DiffSelection::all(),
        }
    }

    #[must_use]
    pub fn with_include_all(&self, include: bool) -> Self {
        let initial = if include {
            InitialSelection::All
        } else {
            InitialSelection::None
        };
        self.with_selection(DiffSelection::from_initial_selection(initial))
    }

    #[must_use]
    pub fn with_selection(&self, selection: DiffSelection) -> Self {
        Self {
            file: self.file.clone(),
            selection,
        }
    }

    /// Patch that stages the selected lines of `diff`
    pub fn create_patch(&self, diff: &Diff) -> Result<String, PatchError> {
        patch::create_patch(&self.file, diff, &self.selection)
    }
}

/// Parse `git status --porcelain -z` output.
///
/// Renamed and copied entries are followed by an extra record holding the
/// original path.
pub fn parse_porcelain(output: &str) -> Vec<FileChange> {
    let mut records = output.split('\0').filter(|record| !record.is_empty());
    let mut changes = Vec::new();

    while let Some(record) = records.next() {
        let (Some(xy), Some(path)) = (record.get(..2), record.get(3..)) else {
            continue;
        };
        let old_path = if xy.contains(['R', 'C']) {
            records.next()
        } else {
            None
        };
        changes.push(FileChange::new(path, FileStatus::from_porcelain(xy, old_path)));
    }

    changes
}
