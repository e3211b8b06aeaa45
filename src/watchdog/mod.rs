//! # Watchdog Module
//!
//! Link-loss detection and failsafe for the remote ground station.
//!
//! This module handles:
//! - Tracking the last heartbeat received from the ground station
//! - Detecting heartbeat timeouts on each host tick
//! - Issuing a single disarm command per link-loss episode
//! - Re-arming the failsafe once heartbeats resume

pub mod command;
pub mod failsafe;
