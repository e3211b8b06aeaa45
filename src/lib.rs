//! # Vessel Relay Library
//!
//! Relay ground-vehicle telemetry to a time-series database and disarm the
//! vehicle when the remote ground station link is lost.
//!
//! This library provides the core state machines of the relay: a battery
//! charge/discharge simulator, a line protocol encoder, a batching dispatch
//! buffer in front of the InfluxDB sink, and a heartbeat watchdog that issues
//! the failsafe command once per link-loss episode.

pub mod config;
pub mod error;
pub mod battery;
pub mod line_protocol;
pub mod dispatch;
pub mod watchdog;
pub mod telemetry;
pub mod serial;
pub mod relay;
