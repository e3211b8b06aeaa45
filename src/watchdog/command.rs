//! # Failsafe Command Channel
//!
//! Trait abstraction for issuing the safety command, and the link adapter that
//! writes it to the vehicle as a JSON `COMMAND_LONG` line.

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{RelayError, Result};

/// MAV_CMD_COMPONENT_ARM_DISARM
pub const MAV_CMD_COMPONENT_ARM_DISARM: u16 = 400;

/// Channel to the autopilot for the safety command.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Issue the failsafe (disarm) command.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Transport` if the command could not be written.
    async fn send_failsafe(&self) -> Result<()>;
}

/// `COMMAND_LONG` message as written on the link.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandLong {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub target_system: u8,
    pub target_component: u8,
    pub command: u16,
    pub confirmation: u8,
    pub param1: f32,
    pub param2: f32,
    pub param3: f32,
    pub param4: f32,
    pub param5: f32,
    pub param6: f32,
    pub param7: f32,
}

impl CommandLong {
    /// Disarm command for the given target.
    pub fn disarm(target_system: u8, target_component: u8) -> Self {
        Self {
            kind: "COMMAND_LONG",
            target_system,
            target_component,
            command: MAV_CMD_COMPONENT_ARM_DISARM,
            confirmation: 0,
            param1: 0.0, // 0 = disarm
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
        }
    }
}

/// Writes failsafe commands as newline-delimited JSON to the vehicle link.
pub struct JsonCommandLink<W> {
    writer: Mutex<W>,
    target_system: u8,
    target_component: u8,
}

impl<W> std::fmt::Debug for JsonCommandLink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCommandLink")
            .field("target_system", &self.target_system)
            .field("target_component", &self.target_component)
            .finish_non_exhaustive()
    }
}

impl<W> JsonCommandLink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W, target_system: u8, target_component: u8) -> Self {
        Self {
            writer: Mutex::new(writer),
            target_system,
            target_component,
        }
    }

    /// Consume the link and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> CommandChannel for JsonCommandLink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send_failsafe(&self) -> Result<()> {
        let command = CommandLong::disarm(self.target_system, self.target_component);
        let mut line = serde_json::to_string(&command)?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to write failsafe command: {}", e)))?;
        writer
            .flush()
            .await
            .map_err(|e| RelayError::Transport(format!("Failed to flush command link: {}", e)))?;

        debug!(
            "Sent disarm to system {} component {}",
            self.target_system, self.target_component
        );
        Ok(())
    }
}
