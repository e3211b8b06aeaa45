//! # Telemetry Packets
//!
//! Packet types consumed from the autopilot link, with the raw fixed-point
//! fields the autopilot sends.
//!
//! | Field | Raw unit | Scale |
//! |-------|----------|-------|
//! | `lat`, `lon` | degrees × 10^7 | / 10,000,000 |
//! | `vx`, `vy` | m/s × 100 | / 100 |
//! | `hdg` | degrees × 100 (65535 = unknown) | / 100 |

use serde::Deserialize;

use crate::line_protocol::sample::Sample;

/// Scale for latitude/longitude (degE7).
pub const LAT_LON_SCALE: f64 = 10_000_000.0;

/// Scale for velocity components (cm/s).
pub const VELOCITY_SCALE: f64 = 100.0;

/// Scale for heading (cdeg).
pub const HEADING_SCALE: f64 = 100.0;

/// Raw heading value meaning "unknown".
pub const HEADING_UNKNOWN: u16 = u16::MAX;

/// One inbound packet, tagged by its `"type"` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryPacket {
    GlobalPositionInt(GlobalPositionInt),
    Heartbeat(Heartbeat),
    Instrumentation(Instrumentation),
    /// Any other packet type; ignored by the relay.
    #[serde(other)]
    Other,
}

/// Fused global position estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GlobalPositionInt {
    /// Latitude (degE7)
    pub lat: i32,
    /// Longitude (degE7)
    pub lon: i32,
    /// Ground X speed, north positive (cm/s)
    pub vx: i16,
    /// Ground Y speed, east positive (cm/s)
    pub vy: i16,
    /// Heading (cdeg)
    #[serde(default = "unknown_heading")]
    pub hdg: u16,
}

fn unknown_heading() -> u16 {
    HEADING_UNKNOWN
}

impl GlobalPositionInt {
    pub fn latitude_deg(&self) -> f64 {
        f64::from(self.lat) / LAT_LON_SCALE
    }

    pub fn longitude_deg(&self) -> f64 {
        f64::from(self.lon) / LAT_LON_SCALE
    }

    pub fn velocity_north(&self) -> f64 {
        f64::from(self.vx) / VELOCITY_SCALE
    }

    pub fn velocity_east(&self) -> f64 {
        f64::from(self.vy) / VELOCITY_SCALE
    }

    /// Horizontal ground speed (m/s).
    pub fn ground_speed(&self) -> f64 {
        self.velocity_north().hypot(self.velocity_east())
    }

    /// Heading in degrees, or `None` when the autopilot reports it unknown.
    pub fn heading_deg(&self) -> Option<f64> {
        if self.hdg == HEADING_UNKNOWN {
            None
        } else {
            Some(f64::from(self.hdg) / HEADING_SCALE)
        }
    }

    /// Add position and velocity fields to `sample`.
    pub fn append_fields(&self, sample: &mut Sample) {
        sample.push_field("latitude", self.latitude_deg());
        sample.push_field("longitude", self.longitude_deg());
        sample.push_field("velocity_north", self.velocity_north());
        sample.push_field("velocity_east", self.velocity_east());
        sample.push_field("velocity", self.ground_speed());
        if let Some(heading) = self.heading_deg() {
            sample.push_field("heading", heading);
        }
    }
}

/// Liveness signal from a peer on the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Heartbeat {
    /// Sender's system id
    #[serde(default)]
    pub system_id: u8,
}

/// Power-train instrumentation readings from the vessel.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Instrumentation {
    /// Battery bus voltage (V)
    pub battery_voltage: f32,
    /// Battery current (A)
    pub battery_current: f32,
    /// Port motor current (A)
    pub port_current: f32,
    /// Starboard motor current (A)
    pub starboard_current: f32,
    /// Solar panel current (A)
    pub panel_current: f32,
}

impl Instrumentation {
    /// Add instrumentation fields to `sample`.
    pub fn append_fields(&self, sample: &mut Sample) {
        sample.push_field("battery_voltage", f64::from(self.battery_voltage));
        sample.push_field("battery_current", f64::from(self.battery_current));
        sample.push_field("port_current", f64::from(self.port_current));
        sample.push_field("starboard_current", f64::from(self.starboard_current));
        sample.push_field("panel_current", f64::from(self.panel_current));
    }
}
