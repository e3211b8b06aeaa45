//! # Telemetry Module
//!
//! Inbound packets from the vehicle link.
//!
//! This module handles:
//! - Packet types the relay reacts to (global position, heartbeat, instrumentation)
//! - Fixed-point to SI unit conversion
//! - Turning packets into line protocol samples
//! - Reading newline-delimited JSON packets from the link

pub mod packet;
pub mod source;
