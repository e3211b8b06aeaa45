//! # Dispatch Module
//!
//! Buffered delivery of encoded telemetry lines to the time-series sink.
//!
//! This module handles:
//! - Accumulating encoded lines up to a fixed batch capacity
//! - Flushing full batches as one newline-joined payload
//! - Drop-or-retry policy for failed batches
//! - Running delivery on its own task so a slow sink never stalls the host loop

pub mod sink;
pub mod buffer;
pub mod worker;
