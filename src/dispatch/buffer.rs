//! # Dispatch Buffer
//!
//! Accumulates encoded lines and flushes them to a [`Sink`] in fixed-size batches.
//!
//! Delivery is at-most-once per batch: the pending lines are taken out of the
//! buffer before the sink is called, so a failing sink can never block the
//! buffer or make it grow. What happens to a failed batch is decided by the
//! [`FailurePolicy`].

use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::sink::Sink;
use crate::error::{RelayError, Result};
use crate::line_protocol::encoder::{join_batch, EncodedLine};

/// What to do with a batch the sink rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log and discard the batch.
    #[default]
    DropOnFailure,
    /// Retry up to `attempts` more times, doubling `backoff` between tries,
    /// then discard.
    RetryNTimes { attempts: u32, backoff: Duration },
}

/// Bounded batch buffer in front of a sink.
///
/// # Examples
///
/// ```no_run
/// use vessel_relay::config::InfluxConfig;
/// use vessel_relay::dispatch::buffer::{DispatchBuffer, FailurePolicy};
/// use vessel_relay::dispatch::sink::InfluxSink;
/// use vessel_relay::line_protocol::encoder::encode;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let sink = InfluxSink::new(&InfluxConfig::default())?;
///     let mut buffer = DispatchBuffer::new(sink, 20, FailurePolicy::DropOnFailure)?;
///
///     buffer.add(encode("vessel", &[("source", "Pixhawk")], &[("heading", 90.0)], 0)?).await;
///     buffer.flush().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DispatchBuffer<S> {
    sink: S,
    pending: Vec<EncodedLine>,
    capacity: usize,
    policy: FailurePolicy,
}

impl<S: Sink> DispatchBuffer<S> {
    /// Create a buffer that flushes every `capacity` lines.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if `capacity` is zero.
    pub fn new(sink: S, capacity: usize, policy: FailurePolicy) -> Result<Self> {
        if capacity == 0 {
            return Err(RelayError::Config(
                "buffer capacity must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            sink,
            pending: Vec::with_capacity(capacity),
            capacity,
            policy,
        })
    }

    /// Append a line, flushing synchronously once the buffer is full.
    ///
    /// Never fails: transport errors are logged inside `flush`.
    pub async fn add(&mut self, line: EncodedLine) {
        self.pending.push(line);
        if self.pending.len() >= self.capacity {
            self.flush().await;
        }
    }

    /// Send all pending lines as one payload and clear the buffer.
    ///
    /// No-op when nothing is pending. The buffer is cleared whether or not
    /// the sink accepts the batch.
    pub async fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        let payload = join_batch(&batch);

        let started = Instant::now();
        let result = self.deliver(&payload).await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(()) => info!(lines = batch.len(), elapsed_ms, "Batch sent to sink"),
            Err(e) => warn!(lines = batch.len(), elapsed_ms, "Dropping batch: {}", e),
        }
    }

    async fn deliver(&self, payload: &str) -> Result<()> {
        let (retries, mut backoff) = match self.policy {
            FailurePolicy::DropOnFailure => (0, Duration::ZERO),
            FailurePolicy::RetryNTimes { attempts, backoff } => (attempts, backoff),
        };

        let mut attempt = 0;
        loop {
            match self.sink.send(payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    warn!("Batch send failed (attempt {} of {}): {}", attempt, retries + 1, e);
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Number of lines waiting for the next flush.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
