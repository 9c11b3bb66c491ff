//! Folderwatch Directory Watcher
//!
//! Polls a directory tree and reports what changed between scans:
//!
//! - [`Watcher::subscribe`] validates the root and takes the baseline scan
//! - [`Watcher::snapshot`] lists everything present at subscription time
//! - [`Watcher::poll`] runs one scan cycle synchronously
//! - [`Watcher::start`] moves the watcher onto a scan thread and returns a
//!   [`WatchStream`] of events and errors
//!
//! Renames and moves are detected by entry identity (device and inode) where
//! the platform provides one.

pub mod cancel;
pub mod error;
pub mod file_id;
pub mod types;
pub mod watcher;

mod diff;
mod scan;

pub use cancel::CancellationToken;
pub use error::{Result, WatchError};
pub use file_id::FileId;
pub use types::{CoalescePolicy, EntryInfo, OpFilter, RawEvent, WatchConfig, WatchOp};
pub use watcher::{WatchSignal, WatchStream, Watcher};
