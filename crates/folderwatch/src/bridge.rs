//! Bridge orchestrator
//!
//! Drives one pipeline instance through its states:
//!
//! ```text
//! Idle -> Connected -> Reconciling -> Streaming -> Closed
//! ```
//!
//! `Closed` is reached from any state on a fatal error or shutdown. Events are
//! published one at a time, in the order the watcher emits them; the next event
//! is not read until the current one is published or has failed for good.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, PublisherError, Result};
use crate::normalize::{normalize, snapshot_event};
use crate::publisher::Publisher;
use folderwatch_protocol::{Encoder, Event};
use folderwatch_watcher::{CancellationToken, WatchError, WatchSignal, WatchStream, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How often a retry backoff checks for shutdown.
const SHUTDOWN_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Idle,
    Connected,
    Reconciling,
    Streaming,
    Closed,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BridgeState::Idle => "idle",
            BridgeState::Connected => "connected",
            BridgeState::Reconciling => "reconciling",
            BridgeState::Streaming => "streaming",
            BridgeState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// Synthetic Create events sent during reconciliation
    pub snapshot_published: usize,
    /// Live events sent while streaming
    pub events_published: usize,
    /// Live changes with no canonical kind
    pub events_skipped: usize,
}

pub struct Bridge<P: Publisher> {
    config: BridgeConfig,
    publisher: P,
    encoder: Box<dyn Encoder>,
    shutdown: CancellationToken,
    state: watch::Sender<BridgeState>,
    report: BridgeReport,
}

impl<P: Publisher> Bridge<P> {
    pub fn new(config: BridgeConfig, publisher: P) -> Self {
        let encoder = config.format.encoder();
        let (state, _) = watch::channel(BridgeState::Idle);
        Self {
            config,
            publisher,
            encoder,
            shutdown: CancellationToken::new(),
            state,
            report: BridgeReport::default(),
        }
    }

    /// Replace the encoder chosen by `config.format`.
    pub fn with_encoder(mut self, encoder: Box<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Token that stops the bridge when cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Receiver that follows state changes while [`Bridge::run`] executes.
    pub fn state_updates(&self) -> watch::Receiver<BridgeState> {
        self.state.subscribe()
    }

    /// Run until the watcher closes, shutdown is requested, or a fatal error.
    ///
    /// The publisher is closed on every exit path.
    pub async fn run(mut self) -> Result<BridgeReport> {
        let outcome = self.run_pipeline().await;
        self.publisher.close().await;
        self.transition(BridgeState::Closed);

        match &outcome {
            Ok(()) => info!(
                snapshot_published = self.report.snapshot_published,
                events_published = self.report.events_published,
                events_skipped = self.report.events_skipped,
                "Bridge stopped"
            ),
            Err(err) => error!(error = %err, "Bridge failed"),
        }
        outcome.map(|()| self.report)
    }

    async fn run_pipeline(&mut self) -> Result<()> {
        if !self.connect().await? {
            info!("Shutdown requested before connecting");
            return Ok(());
        }

        let (watcher, root) = self.subscribe()?;
        self.transition(BridgeState::Reconciling);
        self.reconcile(&watcher, &root).await?;
        if self.shutdown.is_cancelled() {
            info!("Shutdown requested before streaming");
            return Ok(());
        }

        let stream = watcher
            .start(self.shutdown.clone())
            .map_err(BridgeError::WatchSetup)?;
        self.transition(BridgeState::Streaming);
        self.stream(stream, &root).await
    }

    // ========================================================================
    // Connected
    // ========================================================================

    /// Returns `false` if shutdown was requested while waiting to retry.
    async fn connect(&mut self) -> Result<bool> {
        let retry = self.config.retry;
        let mut attempt = 1;
        loop {
            match self.publisher.connect().await {
                Ok(()) => break,
                Err(err) if err.is_retryable() && retry.should_retry(attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Broker connect failed, retrying"
                    );
                    if !self.pause(delay).await {
                        return Ok(false);
                    }
                    attempt += 1;
                }
                Err(err) => return Err(BridgeError::Connection(err)),
            }
        }

        self.publisher
            .declare_exchange(&self.config.broker.exchange)
            .await
            .map_err(|err| match err {
                PublisherError::Connection { .. } => BridgeError::Connection(err),
                _ => BridgeError::Exchange(err),
            })?;

        self.transition(BridgeState::Connected);
        Ok(true)
    }

    /// Sleep for `delay`, waking early on shutdown. Returns `false` on shutdown.
    async fn pause(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        while !self.shutdown.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            tokio::time::sleep((deadline - now).min(SHUTDOWN_POLL)).await;
        }
        false
    }

    fn subscribe(&self) -> Result<(Watcher, PathBuf)> {
        let mut watcher = Watcher::new(self.config.watch.watch_config());
        watcher
            .subscribe(&self.config.watch.path)
            .map_err(BridgeError::WatchSetup)?;
        let root = watcher
            .root()
            .map(Path::to_path_buf)
            .ok_or(BridgeError::WatchSetup(WatchError::NoRoot))?;
        Ok((watcher, root))
    }

    // ========================================================================
    // Reconciling
    // ========================================================================

    /// Publish a Create for every entry in the snapshot, in snapshot order.
    async fn reconcile(&mut self, watcher: &Watcher, root: &Path) -> Result<()> {
        let snapshot = watcher.snapshot();
        info!(entries = snapshot.len(), root = %root.display(), "Publishing snapshot");

        for (path, entry) in &snapshot {
            if self.shutdown.is_cancelled() {
                info!(
                    published = self.report.snapshot_published,
                    "Shutdown requested during reconciliation"
                );
                return Ok(());
            }
            let event = snapshot_event(path, entry, root);
            self.forward(&event).await?;
            self.report.snapshot_published += 1;
        }
        Ok(())
    }

    // ========================================================================
    // Streaming
    // ========================================================================

    async fn stream(&mut self, mut stream: WatchStream, root: &Path) -> Result<()> {
        loop {
            match stream.recv().await {
                WatchSignal::Event(raw) => match normalize(&raw, root) {
                    Some(event) => {
                        self.forward(&event).await?;
                        self.report.events_published += 1;
                    }
                    None => {
                        debug!(op = %raw.op, path = %raw.path.display(), "Skipping non-canonical change");
                        self.report.events_skipped += 1;
                    }
                },
                WatchSignal::Error(err) => return Err(BridgeError::WatchRuntime(err)),
                WatchSignal::Closed => {
                    info!("Watcher closed");
                    return Ok(());
                }
            }
        }
    }

    /// Encode and publish one event, retrying transport failures in place.
    async fn forward(&mut self, event: &Event) -> Result<()> {
        let message = self
            .encoder
            .encode(event)
            .map_err(|source| BridgeError::Encoding {
                path: event.path.clone(),
                source,
            })?;

        let retry = self.config.retry;
        let mut attempt = 1;
        loop {
            let sent = self
                .publisher
                .publish(&self.config.broker.exchange, &self.config.routing_key, &message)
                .await;
            match sent {
                Ok(()) => {
                    debug!(action = %event.kind, path = %event.path, "Event published");
                    return Ok(());
                }
                Err(err) if err.is_retryable() && retry.should_retry(attempt) => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        path = %event.path,
                        error = %err,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(BridgeError::Publish {
                        path: event.path.clone(),
                        source,
                    })
                }
            }
        }
    }

    fn transition(&self, next: BridgeState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Bridge state changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::Result as PublishResult;
    use async_trait::async_trait;
    use folderwatch_protocol::EncodedMessage;

    /// Publisher that refuses every connection attempt.
    struct Unreachable {
        attempts: u32,
    }

    #[async_trait]
    impl Publisher for Unreachable {
        async fn connect(&mut self) -> PublishResult<()> {
            self.attempts += 1;
            Err(PublisherError::Connection {
                target: "rabbitmq@nowhere:5672".to_string(),
                message: "connection refused".to_string(),
            })
        }

        async fn declare_exchange(&mut self, _exchange: &str) -> PublishResult<()> {
            Ok(())
        }

        async fn publish(
            &mut self,
            _exchange: &str,
            _routing_key: &str,
            _message: &EncodedMessage,
        ) -> PublishResult<()> {
            Ok(())
        }

        async fn close(&mut self) {}
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BridgeState::Reconciling.to_string(), "reconciling");
        assert_eq!(BridgeState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_connect_retries_then_escalates() {
        let mut config = BridgeConfig::default();
        config.watch.path = PathBuf::from("/does/not/matter");
        config.retry.max_attempts = 3;
        config.retry.base_delay_ms = 1;

        let mut bridge = Bridge::new(config, Unreachable { attempts: 0 });
        assert_eq!(bridge.state(), BridgeState::Idle);

        let err = bridge.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::Connection(_)));
        assert_eq!(bridge.publisher.attempts, 3);
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_connect_backoff() {
        let mut config = BridgeConfig::default();
        config.watch.path = PathBuf::from("/does/not/matter");
        config.retry.base_delay_ms = 60_000;
        config.retry.max_delay_ms = 60_000;

        let shutdown = CancellationToken::new();
        let mut bridge =
            Bridge::new(config, Unreachable { attempts: 0 }).with_shutdown(shutdown.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.cancel();
        });
        let connected = tokio::time::timeout(Duration::from_secs(5), bridge.connect())
            .await
            .expect("backoff should end on shutdown")
            .unwrap();
        canceller.await.unwrap();

        assert!(!connected);
        assert_eq!(bridge.publisher.attempts, 1);
        assert_eq!(bridge.state(), BridgeState::Idle);
    }

    #[tokio::test]
    async fn test_run_during_connect_backoff_shuts_down_cleanly() {
        let mut config = BridgeConfig::default();
        config.watch.path = PathBuf::from("/does/not/matter");
        config.retry.base_delay_ms = 60_000;

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let bridge = Bridge::new(config, Unreachable { attempts: 0 }).with_shutdown(shutdown);
        let mut states = bridge.state_updates();

        let report = tokio::time::timeout(Duration::from_secs(5), bridge.run())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report, BridgeReport::default());
        assert_eq!(*states.borrow_and_update(), BridgeState::Closed);
    }
}
