//! Polling watcher: subscribe, snapshot, then stream changes from a scan thread.

use crate::cancel::CancellationToken;
use crate::diff::diff;
use crate::error::{Result, WatchError};
use crate::scan::{scan_root, EntryMap};
use crate::types::{CoalescePolicy, EntryInfo, RawEvent, WatchConfig};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct Watcher {
    config: WatchConfig,
    root: Option<PathBuf>,
    entries: EntryMap,
}

impl Watcher {
    pub fn new(config: WatchConfig) -> Self {
        Self {
            config,
            root: None,
            entries: EntryMap::new(),
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Absolute path of the subscribed root.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Subscribe to `root`, replacing any previous subscription.
    ///
    /// The root must be an existing, readable directory. Relative paths are
    /// resolved against the current directory. The initial scan taken here is
    /// the baseline for the first poll and the source of [`Watcher::snapshot`].
    pub fn subscribe(&mut self, root: impl AsRef<Path>) -> Result<()> {
        let root = absolute(root.as_ref()).map_err(|source| WatchError::Setup {
            path: root.as_ref().to_path_buf(),
            source,
        })?;

        let metadata = fs::metadata(&root).map_err(|source| WatchError::Setup {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory(root));
        }
        fs::read_dir(&root).map_err(|source| WatchError::Setup {
            path: root.clone(),
            source,
        })?;

        self.entries = scan_root(&root, &self.config)?;
        info!(
            root = %root.display(),
            entries = self.entries.len(),
            recursive = self.config.recursive,
            "Watch subscription established"
        );
        self.root = Some(root);
        Ok(())
    }

    /// Every entry under the root as of the last scan, root first, in path order.
    pub fn snapshot(&self) -> Vec<(PathBuf, EntryInfo)> {
        self.entries
            .iter()
            .map(|(path, info)| (path.clone(), info.clone()))
            .collect()
    }

    /// Run one scan cycle and return the events it produced.
    ///
    /// Events outside the op filter are discarded before coalescing, so they
    /// never count against the per-cycle limit. Dropped events are not
    /// replayed: the new scan becomes the baseline either way.
    pub fn poll(&mut self) -> Result<Vec<RawEvent>> {
        let root = self.root.clone().ok_or(WatchError::NoRoot)?;

        match fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => return Err(WatchError::RootRemoved(root)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(WatchError::RootRemoved(root))
            }
            Err(err) => {
                return Err(WatchError::Scan {
                    path: root,
                    message: err.to_string(),
                })
            }
        }

        let current = scan_root(&root, &self.config)?;
        let mut events = diff(&self.entries, &current);
        self.entries = current;

        events.retain(|event| self.config.ops.allows(event.op));

        if let CoalescePolicy::FirstPerCycle(max) = self.config.coalesce {
            if events.len() > max {
                debug!(
                    kept = max,
                    dropped = events.len() - max,
                    "Coalesced scan cycle"
                );
                events.truncate(max);
            }
        }

        Ok(events)
    }

    /// Move the watcher onto a scan thread and stream its events.
    ///
    /// The thread polls every `interval` until `token` is cancelled, the
    /// stream is dropped, or a scan fails. A failure is sent on the error
    /// channel before the thread exits. In every case the event channel then
    /// closes.
    pub fn start(mut self, token: CancellationToken) -> Result<WatchStream> {
        let root = self.root.clone().ok_or(WatchError::NoRoot)?;
        let (events_tx, events_rx) = mpsc::channel(self.config.coalesce.channel_capacity());
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let interval = self.config.interval;
        let scan_token = token.clone();

        thread::Builder::new()
            .name("folderwatch-scan".to_string())
            .spawn(move || {
                info!(
                    root = %root.display(),
                    interval_ms = interval.as_millis() as u64,
                    "Watching for changes"
                );
                while scan_token.sleep(interval) {
                    match self.poll() {
                        Ok(events) => {
                            for event in events {
                                debug!(op = %event.op, path = %event.path.display(), "Change detected");
                                if events_tx.blocking_send(event).is_err() {
                                    debug!("Event receiver dropped, stopping scan loop");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            error!(root = %root.display(), error = %err, "Scan failed, stopping watcher");
                            let _ = errors_tx.blocking_send(err);
                            return;
                        }
                    }
                }
                debug!(root = %root.display(), "Scan loop cancelled");
            })
            .map_err(WatchError::Spawn)?;

        Ok(WatchStream {
            events: events_rx,
            errors: errors_rx,
            token,
        })
    }
}

/// What the scan thread reported next.
#[derive(Debug)]
pub enum WatchSignal {
    Event(RawEvent),
    Error(WatchError),
    /// The scan thread stopped without an error
    Closed,
}

/// Receiving end of a started watcher.
///
/// Dropping the stream cancels its token, which stops the scan thread.
pub struct WatchStream {
    events: mpsc::Receiver<RawEvent>,
    errors: mpsc::Receiver<WatchError>,
    token: CancellationToken,
}

impl WatchStream {
    /// Wait for the next signal. Errors are delivered ahead of queued events.
    pub async fn recv(&mut self) -> WatchSignal {
        tokio::select! {
            biased;

            Some(err) = self.errors.recv() => WatchSignal::Error(err),

            event = self.events.recv() => match event {
                Some(event) => WatchSignal::Event(event),
                None => match self.errors.try_recv() {
                    Ok(err) => WatchSignal::Error(err),
                    Err(_) => WatchSignal::Closed,
                },
            },
        }
    }

    /// Ask the scan thread to stop. Already queued events are still delivered.
    pub fn stop(&self) {
        self.token.cancel();
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OpFilter, WatchOp};
    use tempfile::TempDir;

    fn all_ops() -> WatchConfig {
        WatchConfig {
            ops: OpFilter::all(),
            coalesce: CoalescePolicy::All,
            ..Default::default()
        }
    }

    #[test]
    fn test_subscribe_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let mut watcher = Watcher::new(WatchConfig::default());
        let err = watcher.subscribe(temp.path().join("missing")).unwrap_err();
        assert!(err.is_setup());
        assert!(matches!(err, WatchError::Setup { .. }));
        assert!(watcher.root().is_none());
    }

    #[test]
    fn test_subscribe_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = Watcher::new(WatchConfig::default())
            .subscribe(&file)
            .unwrap_err();
        assert!(matches!(err, WatchError::NotADirectory(_)));
    }

    #[test]
    fn test_poll_without_root() {
        let mut watcher = Watcher::new(WatchConfig::default());
        assert!(matches!(watcher.poll(), Err(WatchError::NoRoot)));
    }

    #[test]
    fn test_poll_reports_write_and_chmod_when_enabled() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "one").unwrap();

        let mut watcher = Watcher::new(all_ops());
        watcher.subscribe(temp.path()).unwrap();
        fs::write(&file, "one two three").unwrap();

        let events = watcher.poll().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].op, WatchOp::Write);
    }

    #[test]
    fn test_default_filter_hides_writes() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        fs::write(&file, "one").unwrap();

        let mut watcher = Watcher::new(WatchConfig {
            coalesce: CoalescePolicy::All,
            ..Default::default()
        });
        watcher.subscribe(temp.path()).unwrap();
        fs::write(&file, "one two three").unwrap();
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_coalescing_keeps_first_events() {
        let temp = TempDir::new().unwrap();
        let mut watcher = Watcher::new(WatchConfig {
            coalesce: CoalescePolicy::FirstPerCycle(2),
            ..Default::default()
        });
        watcher.subscribe(temp.path()).unwrap();
        for name in ["c.txt", "a.txt", "b.txt", "d.txt"] {
            fs::write(temp.path().join(name), name).unwrap();
        }

        let events = watcher.poll().unwrap();
        let names: Vec<_> = events
            .iter()
            .map(|e| e.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        // Dropped events are not replayed
        assert!(watcher.poll().unwrap().is_empty());
    }

    #[test]
    fn test_root_removed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("watched");
        fs::create_dir(&root).unwrap();

        let mut watcher = Watcher::new(WatchConfig::default());
        watcher.subscribe(&root).unwrap();
        fs::remove_dir(&root).unwrap();

        assert!(matches!(watcher.poll(), Err(WatchError::RootRemoved(_))));
    }
}
