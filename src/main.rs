//! Upswatch agent entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod config;
mod datalog;
mod monitor;
mod snmp;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use app::cli::Args;
use app::logging::init_tracing;
use config::persistence::load_config;
use config::types::MonitorConfig;
use datalog::{DataLogger, TIMESTAMP_FORMAT};
use monitor::engine::poll_device;
use monitor::{DeviceStatus, MonitorFleet};
use snmp::client::DeviceClient;
use snmp::{NetSnmpTransport, SnmpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. default (info)
    let log_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_lowercase();

    let filter = match log_level.as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" => "warn",
        "error" => "error",
        _ => {
            eprintln!(
                "Invalid log level '{}'. Using INFO. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR",
                log_level
            );
            "info"
        }
    };
    init_tracing(filter);

    let config = load_config(args.config.as_deref()).await?;

    if args.test {
        return run_connection_tests(&config).await;
    }

    if let Some(destination) = args.export.as_deref() {
        let device = args
            .device
            .as_deref()
            .ok_or_else(|| anyhow!("--export requires --device"))?;
        return run_export(
            &config,
            device,
            args.since.as_deref(),
            args.until.as_deref(),
            destination,
        )
        .await;
    }

    if args.show_status {
        return run_show_status(&config).await;
    }

    run_monitor(config).await
}

fn build_clients(config: &MonitorConfig) -> Vec<DeviceClient> {
    let transport: Arc<dyn SnmpTransport> = Arc::new(NetSnmpTransport::new());
    config
        .devices
        .iter()
        .map(|device| DeviceClient::new(device, &config.snmp, Arc::clone(&transport)))
        .collect()
}

/// `--test`: probe every configured device concurrently.
async fn run_connection_tests(config: &MonitorConfig) -> Result<()> {
    if config.devices.is_empty() {
        warn!("No devices configured, nothing to test");
        return Ok(());
    }

    info!("Testing connections to all UPS devices...");
    let clients = build_clients(config);
    let results = join_all(clients.iter().map(|client| async move {
        (client.name().to_string(), client.address().to_string(), client.test_connection().await)
    }))
    .await;

    let mut failures = 0;
    for (name, address, ok) in results {
        if ok {
            info!("{} ({}): Connection successful", name, address);
        } else {
            error!("{} ({}): Connection failed", name, address);
            failures += 1;
        }
    }

    if failures > 0 {
        warn!("{} of {} devices unreachable", failures, config.devices.len());
    }
    Ok(())
}

/// `--show-status`: poll every device once and print the result.
async fn run_show_status(config: &MonitorConfig) -> Result<()> {
    if config.devices.is_empty() {
        warn!("No devices configured");
        return Ok(());
    }

    info!("Current status of all UPS devices:");
    let clients = build_clients(config);
    let records = join_all(clients.iter().map(|client| async move { poll_device(client).await })).await;

    for record in records {
        match record.status {
            DeviceStatus::Online => info!("{}", record.summary()),
            _ => warn!(
                "{}: {} - {}",
                record.device_name,
                record.status,
                record.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    Ok(())
}

/// `--export`: write one device's logged records to a file.
async fn run_export(
    config: &MonitorConfig,
    device: &str,
    since: Option<&str>,
    until: Option<&str>,
    destination: &Path,
) -> Result<()> {
    let start = parse_bound(since).context("Invalid --since value")?;
    let end = parse_bound(until).context("Invalid --until value")?;

    let logger = DataLogger::new(&config.log)?;
    let written = logger.export(device, start, end, destination).await?;
    info!("Exported {} records for {} to {:?}", written, device, destination);
    Ok(())
}

fn parse_bound(value: Option<&str>) -> Result<Option<NaiveDateTime>> {
    value
        .map(|s| {
            NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .map_err(|e| anyhow!("'{}' is not a {} timestamp: {}", s, TIMESTAMP_FORMAT, e))
        })
        .transpose()
}

/// Default mode: poll all devices continuously until interrupted.
async fn run_monitor(config: MonitorConfig) -> Result<()> {
    info!("============================================================");
    info!("Upswatch Agent v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Monitoring {} UPS devices", config.devices.len());
    info!("Poll interval: {} seconds", config.poll_interval_secs);
    info!("Log format: {:?}", config.log.format);
    info!("Log directory: {}", config.log.directory);
    info!("============================================================");

    let logger = Arc::new(DataLogger::new(&config.log)?);
    let transport: Arc<dyn SnmpTransport> = Arc::new(NetSnmpTransport::new());

    let mut fleet = MonitorFleet::new(
        logger,
        transport,
        config.snmp.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );
    fleet.start(&config.devices).await;

    wait_for_shutdown_signal().await;

    fleet.stop().await;
    info!("Agent shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
                info!("Shutdown signal received (Ctrl+C)");
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
            _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
    }
}
