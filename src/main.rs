//! # Vessel Relay
//!
//! Relays vessel telemetry to InfluxDB and disarms the vehicle when the remote
//! ground station stops sending heartbeats.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, default `config/default.toml`)
//!    - Set up logging with tracing subscriber
//!    - Open the vehicle link and split it into packet reader and command writer
//!    - Spawn the dispatch task in front of the InfluxDB sink
//!
//! 2. **Main Loop**
//!    - Feed every inbound packet to the relay
//!    - Poll the link-loss watchdog at the configured interval
//!    - Log relay counters periodically
//!
//! 3. **Graceful Shutdown**
//!    - On Ctrl+C or end of the link stream, stop reading
//!    - Drain the dispatch queue and flush the partial batch
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use vessel_relay::config::{Config, LoggingConfig};
use vessel_relay::dispatch::buffer::DispatchBuffer;
use vessel_relay::dispatch::sink::InfluxSink;
use vessel_relay::dispatch::worker::spawn_dispatcher;
use vessel_relay::error::RelayError;
use vessel_relay::relay::Relay;
use vessel_relay::serial::VehicleLink;
use vessel_relay::telemetry::source::{JsonLinesSource, TelemetrySource};
use vessel_relay::watchdog::command::JsonCommandLink;
use vessel_relay::watchdog::failsafe::Watchdog;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Interval between status log messages
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Upper bound on waiting for the final flush at shutdown
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Daily log file name prefix
const LOG_FILE_PREFIX: &str = "vessel-relay.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging);

    info!("Vessel Relay v{} starting...", env!("CARGO_PKG_VERSION"));

    let link = VehicleLink::open(&config.link)?;
    info!("Vehicle link opened at: {}", link.description());
    let (reader, writer) = link.into_split();
    let mut source = JsonLinesSource::new(reader);

    let commands = JsonCommandLink::new(
        writer,
        config.watchdog.target_system,
        config.watchdog.target_component,
    );
    let watchdog = Arc::new(Watchdog::new(config.watchdog.heartbeat_timeout(), commands)?);

    let sink = InfluxSink::new(&config.influx)?;
    info!("Sending batches of {} lines to {}", config.buffer.capacity, sink.url());
    let buffer = DispatchBuffer::new(sink, config.buffer.capacity, config.buffer.policy())?;
    let (dispatch, dispatch_task) = spawn_dispatcher(buffer, config.buffer.queue_depth);

    let mut relay = Relay::new(
        &config.telemetry,
        &config.watchdog,
        dispatch,
        watchdog,
    );
    if config.battery.enabled {
        relay = relay.with_battery(&config.battery)?;
        info!("Battery simulation enabled ({} Ah)", config.battery.capacity_ah);
    }

    let mut watchdog_tick = interval(config.watchdog.poll_interval());
    watchdog_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut status_tick = interval(STATUS_LOG_INTERVAL);

    info!(
        "Watching ground station heartbeat (timeout {} ms)",
        config.watchdog.heartbeat_timeout_ms
    );
    info!("Press Ctrl+C to exit");

    // Main relay loop
    loop {
        tokio::select! {
            packet = source.next_packet() => match packet {
                Ok(Some(packet)) => {
                    relay.handle_packet(&packet, Instant::now(), chrono::Utc::now().timestamp_millis());
                }
                Ok(None) => {
                    info!("Vehicle link closed");
                    break;
                }
                Err(RelayError::Decode(e)) => warn!("Discarding malformed packet: {}", e),
                Err(e) => {
                    error!("Vehicle link failed: {}", e);
                    break;
                }
            },

            _ = watchdog_tick.tick() => {
                relay.tick(Instant::now()).await;
            }

            _ = status_tick.tick() => {
                let stats = relay.stats();
                info!(
                    packets = stats.packets,
                    queued = stats.samples_queued,
                    dropped = stats.samples_dropped,
                    encoding_errors = stats.encoding_errors,
                    heartbeats = stats.heartbeats,
                    link = ?relay.watchdog().link_state(),
                    "Relay status"
                );
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // Dropping the relay closes the dispatch queue; the task exits once drained
    let drain = async move {
        relay.flush().await;
        drop(relay);
        dispatch_task.await
    };
    match timeout(SHUTDOWN_FLUSH_TIMEOUT, drain).await {
        Ok(Ok(())) => info!("Telemetry flushed"),
        Ok(Err(e)) => error!("Dispatch task failed: {}", e),
        Err(_) => warn!("Timed out waiting for final flush"),
    }

    Ok(())
}

/// Initialise the tracing subscriber.
///
/// Logs go to stderr, since stdout may carry the vehicle link. With a
/// `log_dir` configured they go to a daily rolling file instead; the returned
/// guard must live until exit so buffered lines are written.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[test]
    fn test_shutdown_outlasts_sink_timeout() {
        // The final flush must be allowed at least one full HTTP timeout
        let config = Config::default();
        assert!(SHUTDOWN_FLUSH_TIMEOUT > Duration::from_millis(config.influx.timeout_ms));
    }

    #[test]
    fn test_status_interval_spans_many_polls() {
        let config = Config::default();
        assert!(STATUS_LOG_INTERVAL > config.watchdog.poll_interval());
    }
}
