//! Error taxonomy for the publisher and the bridge

use folderwatch_protocol::EncodingError;
use folderwatch_watcher::WatchError;
use thiserror::Error;

/// Broker-side failures.
#[derive(Error, Debug)]
pub enum PublisherError {
    #[error("Cannot connect to broker at {target}: {message}")]
    Connection { target: String, message: String },

    #[error("Cannot declare exchange '{exchange}': {message}")]
    Exchange { exchange: String, message: String },

    #[error("Publish to exchange '{exchange}' (routing key '{routing_key}') failed: {message}")]
    Publish {
        exchange: String,
        routing_key: String,
        message: String,
    },
}

impl PublisherError {
    /// Transport failures may clear up; a rejected declaration will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublisherError::Connection { .. } | PublisherError::Publish { .. }
        )
    }
}

/// Fatal errors that end a bridge run.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("{0}")]
    Connection(#[source] PublisherError),

    #[error("{0}")]
    Exchange(#[source] PublisherError),

    #[error("Watch setup failed: {0}")]
    WatchSetup(#[source] WatchError),

    #[error("Watcher stopped: {0}")]
    WatchRuntime(#[source] WatchError),

    #[error("Cannot encode event for {path}: {source}")]
    Encoding {
        path: String,
        #[source]
        source: EncodingError,
    },

    #[error("Cannot publish event for {path}: {source}")]
    Publish {
        path: String,
        #[source]
        source: PublisherError,
    },
}

impl BridgeError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            BridgeError::Connection(_) | BridgeError::Exchange(_) => 2,
            BridgeError::WatchSetup(_) | BridgeError::WatchRuntime(_) => 3,
            BridgeError::Encoding { .. } | BridgeError::Publish { .. } => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
