//! # Line Protocol Module
//!
//! Text wire format for the time-series sink.
//!
//! This module handles:
//! - Building timestamped samples from telemetry (ordered tags and fields)
//! - Encoding one sample per line: `measurement,tag=val,... field=val,... timestamp_ms`
//! - Rejecting samples that have no unambiguous encoding
//! - Joining lines into a newline-separated batch payload

pub mod sample;
pub mod encoder;
