//! # Irrigation Monitor
//!
//! Live monitor for an irrigation and climate controller on a serial port.
//!
//! This application polls the controller's text telemetry, keeps the current
//! reading and a rolling history, and logs a classified summary after every
//! new reading.

use anyhow::{Context, Result};
use std::future::Future;
use irrigation_monitor::config::Config;
use irrigation_monitor::error::MonitorError;
use irrigation_monitor::monitor::MonitorSession;
use irrigation_monitor::serial::available_ports;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Consecutive read failures tolerated before the port is closed and reopened
const MAX_CONSECUTIVE_IO_FAILURES: u32 = 5;

/// Main entry point for the irrigation monitor
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Set up logging with tracing subscriber
///    - Load configuration from the path given as first argument, or defaults
///
/// 2. **Main Loop** (one tick per `poll_interval_ms`)
///    - Connect if disconnected; on failure, retry next tick
///    - Read and ingest at most one line
///    - Log the snapshot summary when a new reading arrives
///    - Close the port after repeated read failures so the next tick reopens it
///
/// 3. **Graceful Shutdown** on Ctrl+C
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
///
/// Expected output:
/// ```text
/// INFO irrigation_monitor: Irrigation Monitor v0.1.0 starting...
/// INFO irrigation_monitor::serial: Connected to controller at /dev/ttyUSB0 (115200 baud)
/// INFO irrigation_monitor: 24.3C | air 61.0% | soil Dry (avg 1563) [1820 1430 2011 990] | motors 1/2
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Irrigation Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let ports = available_ports();
    if !ports.is_empty() {
        info!("Available serial ports: {}", ports.join(", "));
    }

    let mut session = MonitorSession::new(&config)?;

    let mut poll_interval = interval(Duration::from_millis(config.telemetry.poll_interval_ms));
    poll_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Polling {} every {} ms", config.serial.port, config.telemetry.poll_interval_ms);
    info!("Press Ctrl+C to exit");

    let mut io_failures: u32 = 0;

    loop {
        tokio::select! {
            _ = poll_interval.tick() => {
                if !session.is_connected() {
                    match connect_unless(&mut session, tokio::signal::ctrl_c()).await {
                        Some(Ok(())) => io_failures = 0,
                        Some(Err(e)) => {
                            warn!("{}; retrying", e);
                            continue;
                        }
                        None => {
                            info!("Received Ctrl+C while connecting, shutting down...");
                            break;
                        }
                    }
                }

                match session.try_poll() {
                    Ok(Some(_)) => {
                        io_failures = 0;
                        let snapshot = session.snapshot();
                        info!("{}", snapshot.summary());
                        match snapshot.to_json() {
                            Ok(json) => debug!("Snapshot: {}", json),
                            Err(e) => debug!("Failed to serialize snapshot: {}", e),
                        }
                    }
                    Ok(None) => io_failures = 0,
                    Err(MonitorError::Io(e)) => {
                        io_failures += 1;
                        error!("Error reading from serial port: {}", e);
                        if io_failures >= MAX_CONSECUTIVE_IO_FAILURES {
                            warn!("{} consecutive read failures, closing port", io_failures);
                            session.disconnect();
                            io_failures = 0;
                        }
                    }
                    Err(e) => debug!("Dropped line: {}", e),
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    session.disconnect();
    info!("Readings retained at shutdown: {}", session.history().len());

    Ok(())
}

/// Connect the session unless `shutdown` completes first.
///
/// Returns `None` when shutdown wins. An interrupted connect never marks
/// the session connected.
async fn connect_unless<F>(
    session: &mut MonitorSession,
    shutdown: F,
) -> Option<irrigation_monitor::error::Result<()>>
where
    F: Future,
{
    tokio::select! {
        biased;

        _ = shutdown => None,
        result = session.connect() => Some(result),
    }
}
