//! Canonical default values shared by the watcher, the publisher and the CLI.

pub const DEFAULT_BROKER_HOST: &str = "localhost";
pub const DEFAULT_BROKER_PORT: u16 = 5672;
pub const DEFAULT_BROKER_USER: &str = "rabbitmq";
pub const DEFAULT_BROKER_PASSWORD: &str = "rabbitmq";
pub const DEFAULT_VHOST: &str = "/";
pub const DEFAULT_EXCHANGE: &str = "folderwatch";
pub const DEFAULT_EXCHANGE_KIND: &str = "topic";
pub const DEFAULT_ROUTING_KEY: &str = "folderwatch.events";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_EVENTS_PER_CYCLE: usize = 1;

/// AMQP header carrying the watch root of each message.
pub const WATCH_ROOT_HEADER: &str = "watch-root";
