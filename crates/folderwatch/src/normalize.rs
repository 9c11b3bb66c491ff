//! Map watcher output onto the canonical event model.
//!
//! Pure functions with no I/O.

use folderwatch_protocol::{Event, EventKind};
use folderwatch_watcher::{EntryInfo, RawEvent, WatchOp};
use std::path::Path;

/// Canonical kind for a watcher operation; `None` for writes and chmods.
pub fn event_kind(op: WatchOp) -> Option<EventKind> {
    match op {
        WatchOp::Create => Some(EventKind::Create),
        WatchOp::Remove => Some(EventKind::Remove),
        WatchOp::Rename => Some(EventKind::Rename),
        WatchOp::Move => Some(EventKind::Move),
        WatchOp::Write | WatchOp::Chmod => None,
    }
}

/// Normalize a raw change, or `None` if it has no canonical kind.
pub fn normalize(raw: &RawEvent, watch_root: &Path) -> Option<Event> {
    let kind = event_kind(raw.op)?;
    Some(Event::new(
        kind,
        path_string(&raw.path),
        raw.is_dir(),
        path_string(watch_root),
    ))
}

/// Synthetic Create for an entry found during reconciliation.
pub fn snapshot_event(path: &Path, entry: &EntryInfo, watch_root: &Path) -> Event {
    Event::new(
        EventKind::Create,
        path_string(path),
        entry.is_dir,
        path_string(watch_root),
    )
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
