//! folderwatch - publish filesystem changes to an AMQP exchange
//!
//! Usage:
//!     folderwatch --watch-folder-path /srv/incoming --rabbit-mq-host rabbit.internal
//!
//! Exit codes: 0 clean shutdown, 1 configuration, 2 broker connection or
//! exchange, 3 watch setup or runtime, 4 encoding or publish.

use anyhow::Context;
use clap::{ArgAction, Parser};
use folderwatch::{AmqpPublisher, Bridge, BridgeConfig, ConfigOverrides};
use folderwatch_logging::{init_logging, LogConfig};
use folderwatch_protocol::Format;
use folderwatch_watcher::CancellationToken;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "folderwatch",
    version,
    about = "Publish filesystem changes to an AMQP exchange"
)]
struct Args {
    /// TOML configuration file; flags override its values
    #[arg(long, env = "FOLDERWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Development mode (human-readable logs); --dev false for production
    #[arg(long, env = "DEV", default_value_t = true, action = ArgAction::Set)]
    dev: bool,

    /// Enable verbose logging
    #[arg(long, env = "VERBOSE")]
    verbose: bool,

    #[arg(long, env = "RABBIT_MQ_HOST")]
    rabbit_mq_host: Option<String>,

    #[arg(long, env = "RABBIT_MQ_PORT")]
    rabbit_mq_port: Option<u16>,

    #[arg(long, env = "RABBIT_MQ_USER")]
    rabbit_mq_user: Option<String>,

    #[arg(long, env = "RABBIT_MQ_PASSWORD", hide_env_values = true)]
    rabbit_mq_password: Option<String>,

    /// Exchange to publish to
    #[arg(long)]
    exchange: Option<String>,

    /// Queue to declare and bind to the exchange
    #[arg(long)]
    queue: Option<String>,

    #[arg(long)]
    routing_key: Option<String>,

    /// Path to watch file changes within
    #[arg(long, visible_alias = "watchFolderPath", env = "WATCH_FOLDER_PATH")]
    watch_folder_path: Option<PathBuf>,

    /// Watch subdirectories (true/false)
    #[arg(long, action = ArgAction::Set)]
    recursive: Option<bool>,

    /// Include dotfiles and dot-directories (true/false)
    #[arg(long, action = ArgAction::Set)]
    include_hidden: Option<bool>,

    /// Milliseconds between scans
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Events forwarded per scan cycle; 0 forwards all
    #[arg(long)]
    max_events_per_cycle: Option<usize>,

    /// Message body encoding: json or xml
    #[arg(long)]
    format: Option<Format>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.rabbit_mq_host.clone(),
            port: self.rabbit_mq_port,
            user: self.rabbit_mq_user.clone(),
            password: self.rabbit_mq_password.clone(),
            exchange: self.exchange.clone(),
            queue: self.queue.clone(),
            routing_key: self.routing_key.clone(),
            watch_path: self.watch_folder_path.clone(),
            recursive: self.recursive,
            include_hidden: self.include_hidden,
            interval_ms: self.interval_ms,
            max_events_per_cycle: self.max_events_per_cycle,
            format: self.format,
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    config.apply(args.overrides());
    config.validate()?;
    Ok(config)
}

fn install_signal_handlers(shutdown: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
        std::thread::Builder::new()
            .name("folderwatch-signals".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {}, initiating shutdown...", sig);
                    shutdown.cancel();
                }
            })
            .context("Failed to spawn signal thread")?;
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, initiating shutdown...");
            shutdown.cancel();
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "folderwatch",
        verbose: args.verbose,
        dev: args.dev,
    }) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging setup failed: {:#}", err);
            None
        }
    };

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %format!("{:#}", err), "Configuration error");
            eprintln!("Error: {:#}", err);
            return ExitCode::from(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        broker = %config.broker.target(),
        exchange = %config.broker.exchange,
        routing_key = %config.routing_key,
        root = %config.watch.path.display(),
        format = %config.format,
        "Starting folderwatch"
    );

    let shutdown = CancellationToken::new();
    if let Err(err) = install_signal_handlers(shutdown.clone()) {
        warn!(error = %format!("{:#}", err), "Signal handling unavailable");
    }

    let publisher = AmqpPublisher::new(config.broker.clone(), config.routing_key.clone());
    let bridge = Bridge::new(config, publisher).with_shutdown(shutdown);

    match bridge.run().await {
        Ok(report) => {
            info!(
                snapshot_published = report.snapshot_published,
                events_published = report.events_published,
                "Shutdown complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "folderwatch",
            "--watchFolderPath",
            "/data",
            "--rabbit-mq-port",
            "5673",
            "--recursive",
            "false",
            "--format",
            "xml",
        ])
        .unwrap();

        let config = load_config(&args).unwrap();
        assert_eq!(config.watch.path, PathBuf::from("/data"));
        assert_eq!(config.broker.port, 5673);
        assert!(!config.watch.recursive);
        assert_eq!(config.format, Format::Xml);
    }

    #[test]
    fn test_missing_watch_path_is_config_error() {
        let mut args = Args::try_parse_from(["folderwatch"]).unwrap();
        args.config = None;
        args.watch_folder_path = None;
        let err = load_config(&args).unwrap_err();
        assert!(format!("{:#}", err).contains("watch"), "{:#}", err);
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
