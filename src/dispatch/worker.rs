//! # Dispatch Worker
//!
//! Runs a [`DispatchBuffer`] on its own tokio task.
//!
//! The host loop submits lines through a bounded queue and never waits on the
//! network. A single task owns the buffer, so batches reach the sink one at a
//! time and in the order they were completed.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::buffer::DispatchBuffer;
use super::sink::Sink;
use crate::line_protocol::encoder::EncodedLine;

#[derive(Debug)]
enum DispatchCommand {
    Line(EncodedLine),
    Flush,
}

/// Cloneable handle for feeding the dispatch task.
///
/// Dropping every handle closes the queue; the task then flushes whatever is
/// pending and exits.
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<DispatchCommand>,
}

impl DispatchHandle {
    /// Queue a line without waiting.
    ///
    /// Returns `false` if the line was dropped because the queue is full or
    /// the dispatch task has stopped.
    pub fn submit(&self, line: EncodedLine) -> bool {
        match self.tx.try_send(DispatchCommand::Line(line)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Dispatch queue full, dropping telemetry line");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Dispatch task stopped, dropping telemetry line");
                false
            }
        }
    }

    /// Ask the task to flush its partial batch after the lines queued so far.
    pub async fn flush(&self) {
        if self.tx.send(DispatchCommand::Flush).await.is_err() {
            debug!("Flush requested after dispatch task stopped");
        }
    }
}

/// Spawn the dispatch task.
///
/// # Arguments
///
/// * `buffer` - Buffer (and sink) the task takes ownership of
/// * `queue_depth` - Maximum number of queued commands (at least 1)
///
/// # Returns
///
/// * `(DispatchHandle, JoinHandle<()>)` - Submission handle and the task, which
///   completes after the final flush once all handles are dropped
pub fn spawn_dispatcher<S>(
    mut buffer: DispatchBuffer<S>,
    queue_depth: usize,
) -> (DispatchHandle, JoinHandle<()>)
where
    S: Sink + 'static,
{
    let (tx, mut rx) = mpsc::channel(queue_depth.max(1));

    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                DispatchCommand::Line(line) => buffer.add(line).await,
                DispatchCommand::Flush => buffer.flush().await,
            }
        }

        let remaining = buffer.pending_len();
        buffer.flush().await;
        info!("Dispatch task stopped ({} lines in final flush)", remaining);
    });

    (DispatchHandle { tx }, task)
}
