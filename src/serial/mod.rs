//! # Serial Link Module
//!
//! Handles the bidirectional link to the vehicle's autopilot.
//!
//! This module handles:
//! - Opening the telemetry radio / autopilot serial port (8N1)
//! - Falling back through candidate device paths
//! - Using standard input/output as the link when configured as `"stdio"`
//! - Splitting the link into a packet reader and a command writer

use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{RelayError, Result};

/// Link port value selecting standard input/output.
pub const STDIO_PORT: &str = "stdio";

/// Device paths tried when the configured port cannot be opened (in order of preference)
const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // Autopilot USB CDC
    "/dev/ttyUSB0", // Telemetry radio via USB-to-serial adapter
];

/// Inbound half of the link
pub type LinkReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Outbound half of the link
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Open vehicle link, ready to be split.
pub struct VehicleLink {
    reader: LinkReader,
    writer: LinkWriter,
    description: String,
}

impl std::fmt::Debug for VehicleLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleLink")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl VehicleLink {
    /// Open the link described by `config`.
    ///
    /// The configured port is tried first, then the fallback device paths.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Serial` if no device could be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vessel_relay::config::LinkConfig;
    /// use vessel_relay::serial::VehicleLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = VehicleLink::open(&LinkConfig::default())?;
    ///     println!("Connected to: {}", link.description());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &LinkConfig) -> Result<Self> {
        if config.port == STDIO_PORT {
            info!("Using standard input/output as vehicle link");
            return Ok(Self {
                reader: Box::new(BufReader::new(tokio::io::stdin())),
                writer: Box::new(tokio::io::stdout()),
                description: STDIO_PORT.to_string(),
            });
        }

        let mut paths = vec![config.port.as_str()];
        paths.extend(FALLBACK_DEVICE_PATHS.iter().filter(|p| **p != config.port));
        Self::open_with_paths(&paths, config.baud_rate)
    }

    /// Open the first serial device that succeeds
    ///
    /// # Arguments
    ///
    /// * `paths` - Device paths to try (e.g., &["/dev/ttyACM0"])
    /// * `baud_rate` - Link baud rate
    pub fn open_with_paths(paths: &[&str], baud_rate: u32) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened vehicle link at {} ({} baud)", path, baud_rate);
                    let (read_half, write_half) = tokio::io::split(port);
                    return Ok(Self {
                        reader: Box::new(BufReader::new(read_half)),
                        writer: Box::new(write_half),
                        description: path.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(RelayError::Serial(format!(
            "no vehicle link found (tried: {})",
            paths.join(", ")
        )))
    }

    /// Open a specific serial port with 8N1 settings
    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RelayError::Serial(format!("Failed to open {}: {}", path, e)))?;

        Ok(port)
    }

    /// Device path or `"stdio"`
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Split into the packet reader and the command writer
    pub fn into_split(self) -> (LinkReader, LinkWriter) {
        (self.reader, self.writer)
    }
}
