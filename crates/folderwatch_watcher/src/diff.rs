//! Turn two consecutive scans into an ordered list of changes.
//!
//! An entry that vanished from one path and appeared at another with the same
//! [`FileId`](crate::FileId) is reported once: as a Rename when the parent
//! directory is unchanged, as a Move otherwise.
//!
//! Output order within a cycle: renames and moves, creates, removes, writes,
//! then chmods. Each group is in path order.

use crate::file_id::FileId;
use crate::scan::EntryMap;
use crate::types::{EntryInfo, RawEvent, WatchOp};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub(crate) fn diff(old: &EntryMap, new: &EntryMap) -> Vec<RawEvent> {
    let mut created: BTreeMap<&PathBuf, &EntryInfo> = new
        .iter()
        .filter(|(path, _)| !old.contains_key(*path))
        .collect();
    let mut removed: BTreeMap<&PathBuf, &EntryInfo> = old
        .iter()
        .filter(|(path, _)| !new.contains_key(*path))
        .collect();

    let mut removed_by_id: HashMap<FileId, &PathBuf> = removed
        .iter()
        .filter_map(|(path, info)| info.file_id.map(|id| (id, *path)))
        .collect();

    let mut paired = Vec::new();
    for (new_path, info) in &created {
        if let Some(old_path) = info.file_id.and_then(|id| removed_by_id.remove(&id)) {
            paired.push((*new_path, old_path, *info));
        }
    }

    let mut events = Vec::with_capacity(created.len() + removed.len());

    for (new_path, old_path, info) in paired {
        created.remove(new_path);
        removed.remove(old_path);
        let op = if new_path.parent() == old_path.parent() {
            WatchOp::Rename
        } else {
            WatchOp::Move
        };
        events.push(RawEvent {
            op,
            path: new_path.clone(),
            old_path: Some(old_path.clone()),
            entry: info.clone(),
        });
    }

    events.extend(created.into_iter().map(|(path, info)| event(WatchOp::Create, path, info)));
    events.extend(removed.into_iter().map(|(path, info)| event(WatchOp::Remove, path, info)));

    let mut chmods = Vec::new();
    for (path, newer) in new {
        let Some(older) = old.get(path) else {
            continue;
        };
        if older.content_changed(newer) {
            events.push(event(WatchOp::Write, path, newer));
        }
        if older.mode != newer.mode {
            chmods.push(event(WatchOp::Chmod, path, newer));
        }
    }
    events.extend(chmods);

    events
}

fn event(op: WatchOp, path: &Path, info: &EntryInfo) -> RawEvent {
    RawEvent {
        op,
        path: path.to_path_buf(),
        old_path: None,
        entry: info.clone(),
    }
}
