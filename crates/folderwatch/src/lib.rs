//! Folderwatch
//!
//! Watches a directory tree and publishes every change to an AMQP exchange.
//! On startup the bridge first publishes a synthetic `CREATE` for each entry
//! already present, then streams live changes in detection order.
//!
//! ```text
//! filesystem -> Watcher -> normalize -> Encoder -> Publisher -> exchange
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod normalize;
pub mod publisher;
pub mod retry;

pub use bridge::{Bridge, BridgeReport, BridgeState};
pub use config::{BridgeConfig, BrokerConfig, ChannelMode, ConfigError, ConfigOverrides, WatchSettings};
pub use error::{BridgeError, PublisherError};
pub use normalize::{normalize, snapshot_event};
pub use publisher::{AmqpPublisher, Publisher};
pub use retry::RetryPolicy;
