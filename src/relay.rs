//! # Relay
//!
//! The host dispatch point. The event loop calls [`Relay::handle_packet`] for
//! every inbound packet and [`Relay::tick`] on a fixed cadence; everything else
//! (encoding, batching, failsafe) hangs off those two entry points.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::battery::BatterySim;
use crate::config::{BatteryConfig, TelemetryConfig, WatchdogConfig};
use crate::dispatch::worker::DispatchHandle;
use crate::error::Result;
use crate::line_protocol::encoder::encode_sample;
use crate::line_protocol::sample::Sample;
use crate::telemetry::packet::TelemetryPacket;
use crate::watchdog::command::CommandChannel;
use crate::watchdog::failsafe::{Watchdog, WatchdogEvent};

/// Battery simulator plus the load profile it is driven with.
#[derive(Debug)]
struct SimulatedBattery {
    sim: BatterySim,
    load_current_a: f64,
    step_s: f64,
}

/// Per-packet counters, for the periodic status log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub packets: u64,
    pub samples_queued: u64,
    pub samples_dropped: u64,
    pub encoding_errors: u64,
    pub heartbeats: u64,
}

/// Turns vehicle packets into queued samples and drives the watchdog.
#[derive(Debug)]
pub struct Relay<C> {
    measurement: String,
    source_tag: String,
    heartbeat_system_id: Option<u8>,
    vehicle_system_id: u8,
    battery: Option<SimulatedBattery>,
    dispatch: DispatchHandle,
    watchdog: Arc<Watchdog<C>>,
    stats: RelayStats,
}

impl<C: CommandChannel> Relay<C> {
    /// Create a relay without battery simulation.
    ///
    /// Heartbeats are filtered with `watchdog_config`: only
    /// `heartbeat_system_id` counts when set, otherwise every system except the
    /// vehicle itself (`target_system`).
    pub fn new(
        telemetry: &TelemetryConfig,
        watchdog_config: &WatchdogConfig,
        dispatch: DispatchHandle,
        watchdog: Arc<Watchdog<C>>,
    ) -> Self {
        Self {
            measurement: telemetry.measurement.clone(),
            source_tag: telemetry.source_tag.clone(),
            heartbeat_system_id: watchdog_config.heartbeat_system_id,
            vehicle_system_id: watchdog_config.target_system,
            battery: None,
            dispatch,
            watchdog,
            stats: RelayStats::default(),
        }
    }

    /// Attach a battery simulator stepped once per position packet.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if the battery parameters are invalid.
    pub fn with_battery(mut self, config: &BatteryConfig) -> Result<Self> {
        self.battery = Some(SimulatedBattery {
            sim: BatterySim::new(config.params(), config.initial_soc)?,
            load_current_a: config.load_current_a,
            step_s: config.step_s,
        });
        Ok(self)
    }

    /// Handle one inbound packet.
    ///
    /// # Arguments
    ///
    /// * `packet` - Decoded packet
    /// * `received_at` - Monotonic arrival time (heartbeat bookkeeping)
    /// * `timestamp_ms` - Wall-clock Unix milliseconds stamped on the sample
    pub fn handle_packet(&mut self, packet: &TelemetryPacket, received_at: Instant, timestamp_ms: i64) {
        self.stats.packets += 1;

        match packet {
            TelemetryPacket::Heartbeat(heartbeat) => {
                if self.counts_heartbeat_from(heartbeat.system_id) {
                    self.stats.heartbeats += 1;
                    self.watchdog.record_heartbeat(received_at);
                } else {
                    trace!("Ignoring heartbeat from system {}", heartbeat.system_id);
                }
            }
            TelemetryPacket::GlobalPositionInt(position) => {
                let mut sample = self.new_sample(timestamp_ms);
                position.append_fields(&mut sample);

                if let Some(battery) = &mut self.battery {
                    battery.sim.step(battery.load_current_a, battery.step_s);
                    sample.push_field("battery_voltage", battery.sim.voltage());
                    sample.push_field("battery_soc", battery.sim.state_of_charge());
                }

                self.queue(&sample);
            }
            TelemetryPacket::Instrumentation(instrumentation) => {
                let mut sample = self.new_sample(timestamp_ms);
                instrumentation.append_fields(&mut sample);
                self.queue(&sample);
            }
            TelemetryPacket::Other => {}
        }
    }

    /// Poll the link-loss watchdog.
    pub async fn tick(&self, now: Instant) -> WatchdogEvent {
        self.watchdog.poll(now).await
    }

    /// Ask the dispatcher to flush its partial batch.
    pub async fn flush(&self) {
        self.dispatch.flush().await;
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn watchdog(&self) -> &Watchdog<C> {
        &self.watchdog
    }

    fn counts_heartbeat_from(&self, system_id: u8) -> bool {
        match self.heartbeat_system_id {
            Some(id) => id == system_id,
            None => system_id != self.vehicle_system_id,
        }
    }

    fn new_sample(&self, timestamp_ms: i64) -> Sample {
        Sample::new(timestamp_ms).tag("source", self.source_tag.as_str())
    }

    fn queue(&mut self, sample: &Sample) {
        match encode_sample(&self.measurement, sample) {
            Ok(line) => {
                debug!("Queued sample: {}", line);
                if self.dispatch.submit(line) {
                    self.stats.samples_queued += 1;
                } else {
                    self.stats.samples_dropped += 1;
                }
            }
            Err(e) => {
                self.stats.encoding_errors += 1;
                warn!("Skipping sample: {}", e);
            }
        }
    }
}
