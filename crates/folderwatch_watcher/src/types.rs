//! Watcher value types

use crate::file_id::{self, FileId};
use std::collections::HashSet;
use std::fmt;
use std::fs::Metadata;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

// ============================================================================
// Operations
// ============================================================================

/// Kind of change observed between two scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchOp {
    Create,
    Write,
    Remove,
    Rename,
    Move,
    Chmod,
}

impl WatchOp {
    pub const ALL: [WatchOp; 6] = [
        WatchOp::Create,
        WatchOp::Write,
        WatchOp::Remove,
        WatchOp::Rename,
        WatchOp::Move,
        WatchOp::Chmod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchOp::Create => "CREATE",
            WatchOp::Write => "WRITE",
            WatchOp::Remove => "REMOVE",
            WatchOp::Rename => "RENAME",
            WatchOp::Move => "MOVE",
            WatchOp::Chmod => "CHMOD",
        }
    }
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of operations delivered to the consumer.
///
/// Defaults to the four kinds the bridge publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpFilter {
    ops: HashSet<WatchOp>,
}

impl OpFilter {
    pub fn all() -> Self {
        Self::only(WatchOp::ALL)
    }

    pub fn only(ops: impl IntoIterator<Item = WatchOp>) -> Self {
        Self {
            ops: ops.into_iter().collect(),
        }
    }

    pub fn allows(&self, op: WatchOp) -> bool {
        self.ops.contains(&op)
    }
}

impl Default for OpFilter {
    fn default() -> Self {
        Self::only([
            WatchOp::Create,
            WatchOp::Remove,
            WatchOp::Rename,
            WatchOp::Move,
        ])
    }
}

// ============================================================================
// Entries and events
// ============================================================================

/// What a scan records about one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub is_dir: bool,
    pub len: u64,
    pub modified: Option<SystemTime>,
    pub mode: u32,
    pub file_id: Option<FileId>,
}

impl EntryInfo {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            is_dir: metadata.is_dir(),
            len: metadata.len(),
            modified: metadata.modified().ok(),
            mode: file_id::mode_bits(metadata),
            file_id: file_id::file_id(metadata),
        }
    }

    /// Content changed: size or modification time differs. Directories never report writes.
    pub(crate) fn content_changed(&self, newer: &EntryInfo) -> bool {
        !newer.is_dir && (self.len != newer.len || self.modified != newer.modified)
    }
}

/// A change as the watcher observed it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub op: WatchOp,
    /// Absolute path of the affected entry (the destination for renames and moves)
    pub path: PathBuf,
    /// Previous path, for renames and moves
    pub old_path: Option<PathBuf>,
    /// Current info, or the last known info for removals
    pub entry: EntryInfo,
}

impl RawEvent {
    pub fn is_dir(&self) -> bool {
        self.entry.is_dir
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// How many events one scan cycle may deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescePolicy {
    /// Deliver every event
    All,
    /// Deliver the first `n` events of each cycle and drop the rest
    FirstPerCycle(usize),
}

impl CoalescePolicy {
    /// Map a "max events per cycle" setting; 0 disables coalescing.
    pub fn from_max_events(max: usize) -> Self {
        if max == 0 {
            CoalescePolicy::All
        } else {
            CoalescePolicy::FirstPerCycle(max)
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            CoalescePolicy::All => None,
            CoalescePolicy::FirstPerCycle(max) => Some(*max),
        }
    }

    pub(crate) fn channel_capacity(&self) -> usize {
        const UNBOUNDED_CYCLE_CAPACITY: usize = 1024;
        match self {
            CoalescePolicy::All => UNBOUNDED_CYCLE_CAPACITY,
            CoalescePolicy::FirstPerCycle(max) => (*max).max(1),
        }
    }
}

impl Default for CoalescePolicy {
    fn default() -> Self {
        CoalescePolicy::FirstPerCycle(1)
    }
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Time between scans
    pub interval: Duration,
    /// Watch subdirectories, including ones created later
    pub recursive: bool,
    /// Include dotfiles and dot-directories
    pub include_hidden: bool,
    pub ops: OpFilter,
    pub coalesce: CoalescePolicy,
    /// Directory names skipped at any depth
    pub exclude_dir_names: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            recursive: true,
            include_hidden: false,
            ops: OpFilter::default(),
            coalesce: CoalescePolicy::default(),
            exclude_dir_names: Vec::new(),
        }
    }
}
