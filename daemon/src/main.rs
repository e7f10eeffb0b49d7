//! Stela daemon — runs the server-side messaging services.
//!
//! Starts the public heartbeat publisher, plus the secure variant when
//! a heartbeat credential is configured. The block and transaction
//! services are constructed by the node composition that owns their
//! feed queues, so they are not started here.

use std::sync::Arc;

use clap::Parser;
use stela_network::{Authenticator, Context};
use stela_server::logging::{init_logging, LogFormat};
use stela_server::{worker, HeartbeatService, ServerSettings};

#[derive(Parser)]
#[command(name = "stela-daemon", about = "Stela messaging node daemon")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "STELA_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Overrides the config file value.
    #[arg(long, env = "STELA_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json". Overrides the config file value.
    #[arg(long, env = "STELA_LOG_FORMAT")]
    log_format: Option<String>,

    /// Debug-log every published frame.
    #[arg(long, env = "STELA_LOG_REQUESTS")]
    log_requests: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => ServerSettings::from_toml_file(path)?,
        None => ServerSettings::default(),
    };
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if let Some(format) = cli.log_format {
        settings.log_format = format;
    }
    if cli.log_requests {
        settings.log_requests = true;
    }

    init_logging(LogFormat::parse(&settings.log_format), &settings.log_level);
    tracing::info!(
        interval = settings.heartbeat_interval_seconds,
        "starting stela messaging services"
    );

    let context = Context::new();
    let authenticator = Arc::new(Authenticator::new(settings.secure_domain_keys.clone()));

    let mut services = vec![(
        "public heartbeat",
        worker::start(HeartbeatService::new(
            &context,
            Arc::clone(&authenticator),
            &settings,
            false,
        )),
    )];
    if settings.secure_domain_keys.contains_key("heartbeat") {
        services.push((
            "secure heartbeat",
            worker::start(HeartbeatService::new(
                &context,
                Arc::clone(&authenticator),
                &settings,
                true,
            )),
        ));
    }

    for (name, handle) in &mut services {
        if handle.wait_started().await {
            tracing::info!(service = *name, "service running");
        } else {
            tracing::error!(service = *name, "service failed to start");
        }
    }

    context.wait_for_signal().await;

    for (name, handle) in services {
        handle.stop();
        match handle.join().await {
            Some(true) | None => {}
            Some(false) => tracing::error!(service = name, "service did not unbind cleanly"),
        }
    }

    tracing::info!("stela daemon stopped");
    Ok(())
}
