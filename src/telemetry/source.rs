//! # Telemetry Source
//!
//! Trait abstraction for the inbound packet stream, and the newline-delimited
//! JSON reader used on the vehicle link.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use super::packet::TelemetryPacket;
use crate::error::Result;

/// Stream of packets from the vehicle.
#[async_trait]
pub trait TelemetrySource: Send {
    /// Next packet, or `None` once the stream has ended.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Decode` for a malformed packet (the stream stays
    /// usable) and `RelayError::Io` if the link itself fails.
    async fn next_packet(&mut self) -> Result<Option<TelemetryPacket>>;
}

/// Reads one JSON packet per line. Blank lines are skipped.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
}

impl<R> std::fmt::Debug for JsonLinesSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesSource").finish_non_exhaustive()
    }
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> TelemetrySource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_packet(&mut self) -> Result<Option<TelemetryPacket>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(line)?));
        }
        Ok(None)
    }
}
