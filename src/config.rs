//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::battery::BatteryParams;
use crate::dispatch::buffer::FailurePolicy;
use crate::error::{RelayError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub influx: InfluxConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Vehicle link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Serial device path, or `"stdio"` to use standard input/output
    #[serde(default = "default_link_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// InfluxDB sink configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InfluxConfig {
    #[serde(default = "default_influx_host")]
    pub host: String,

    #[serde(default = "default_influx_port")]
    pub port: u16,

    #[serde(default = "default_influx_org")]
    pub org: String,

    #[serde(default = "default_influx_bucket")]
    pub bucket: String,

    /// API token; empty sends no Authorization header
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub use_tls: bool,

    #[serde(default = "default_influx_timeout_ms")]
    pub timeout_ms: u64,
}

/// Failed-batch handling
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicyKind {
    Drop,
    Retry,
}

/// Dispatch buffer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BufferConfig {
    #[serde(default = "default_buffer_capacity")]
    pub capacity: usize,

    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    #[serde(default = "default_failure_policy")]
    pub failure_policy: FailurePolicyKind,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Link-loss watchdog configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WatchdogConfig {
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Only heartbeats from this system id keep the link alive; when unset,
    /// any system other than `target_system` counts
    #[serde(default)]
    pub heartbeat_system_id: Option<u8>,

    #[serde(default = "default_target_system")]
    pub target_system: u8,

    #[serde(default = "default_target_component")]
    pub target_component: u8,
}

/// Telemetry sample configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

/// Battery simulator configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BatteryConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_capacity_ah")]
    pub capacity_ah: f64,

    #[serde(default = "default_voltage_full")]
    pub voltage_full: f64,

    #[serde(default = "default_voltage_empty")]
    pub voltage_empty: f64,

    #[serde(default = "default_internal_resistance")]
    pub internal_resistance: f64,

    #[serde(default = "default_initial_soc")]
    pub initial_soc: f64,

    #[serde(default)]
    pub noise_std: f64,

    #[serde(default = "default_load_current_a")]
    pub load_current_a: f64,

    #[serde(default = "default_step_s")]
    pub step_s: f64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; empty logs to stderr only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_link_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 57600 }

fn default_influx_host() -> String { "localhost".to_string() }
fn default_influx_port() -> u16 { 8086 }
fn default_influx_org() -> String { "vessel".to_string() }
fn default_influx_bucket() -> String { "telemetry".to_string() }
fn default_influx_timeout_ms() -> u64 { 5000 }

fn default_buffer_capacity() -> usize { 20 }
fn default_queue_depth() -> usize { 64 }
fn default_failure_policy() -> FailurePolicyKind { FailurePolicyKind::Drop }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_backoff_ms() -> u64 { 500 }

fn default_heartbeat_timeout_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_target_system() -> u8 { 1 }
fn default_target_component() -> u8 { 1 }

fn default_measurement() -> String { "vessel".to_string() }
fn default_source_tag() -> String { "Pixhawk".to_string() }

fn default_capacity_ah() -> f64 { 5.0 }
fn default_voltage_full() -> f64 { 54.6 }
fn default_voltage_empty() -> f64 { 48.0 }
fn default_internal_resistance() -> f64 { 0.1 }
fn default_initial_soc() -> f64 { 1.0 }
fn default_load_current_a() -> f64 { 5.0 }
fn default_step_s() -> f64 { 5.0 }

fn default_log_level() -> String { "info".to_string() }

/// Baud rates supported by common telemetry radios and autopilot ports
const VALID_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

/// Reserved line protocol characters, also invalid in measurement and tag names
const RESERVED_NAME_CHARS: &[char] = &[',', ' ', '=', '\n', '\r'];

impl Default for LinkConfig {
    fn default() -> Self {
        Self { port: default_link_port(), baud_rate: default_baud_rate() }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            host: default_influx_host(),
            port: default_influx_port(),
            org: default_influx_org(),
            bucket: default_influx_bucket(),
            token: String::new(),
            use_tls: false,
            timeout_ms: default_influx_timeout_ms(),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_buffer_capacity(),
            queue_depth: default_queue_depth(),
            failure_policy: default_failure_policy(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_system_id: None,
            target_system: default_target_system(),
            target_component: default_target_component(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { measurement: default_measurement(), source_tag: default_source_tag() }
    }
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity_ah: default_capacity_ah(),
            voltage_full: default_voltage_full(),
            voltage_empty: default_voltage_empty(),
            internal_resistance: default_internal_resistance(),
            initial_soc: default_initial_soc(),
            noise_std: 0.0,
            load_current_a: default_load_current_a(),
            step_s: default_step_s(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), log_dir: String::new() }
    }
}

impl BufferConfig {
    /// Failure policy described by this section
    pub fn policy(&self) -> FailurePolicy {
        match self.failure_policy {
            FailurePolicyKind::Drop => FailurePolicy::DropOnFailure,
            FailurePolicyKind::Retry => FailurePolicy::RetryNTimes {
                attempts: self.retry_attempts,
                backoff: Duration::from_millis(self.retry_backoff_ms),
            },
        }
    }
}

impl WatchdogConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl BatteryConfig {
    pub fn params(&self) -> BatteryParams {
        BatteryParams::from_amp_hours(
            self.capacity_ah,
            self.voltage_full,
            self.voltage_empty,
            self.internal_resistance,
        )
        .with_noise(self.noise_std)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vessel_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Validate link configuration
        if self.link.port.is_empty() {
            return Err(invalid("link port cannot be empty"));
        }

        if !VALID_BAUD_RATES.contains(&self.link.baud_rate) {
            return Err(invalid(format!(
                "baud_rate must be one of: {}",
                VALID_BAUD_RATES.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
            )));
        }

        // Validate sink configuration
        if self.influx.host.is_empty() {
            return Err(invalid("influx host cannot be empty"));
        }

        if self.influx.port == 0 {
            return Err(invalid("influx port must be greater than 0"));
        }

        if self.influx.org.is_empty() || self.influx.bucket.is_empty() {
            return Err(invalid("influx org and bucket cannot be empty"));
        }

        if self.influx.timeout_ms == 0 || self.influx.timeout_ms > 60000 {
            return Err(invalid("influx timeout_ms must be between 1 and 60000"));
        }

        // Validate buffer configuration
        if self.buffer.capacity == 0 {
            return Err(invalid("buffer capacity must be greater than 0"));
        }

        if self.buffer.queue_depth == 0 {
            return Err(invalid("buffer queue_depth must be greater than 0"));
        }

        if self.buffer.failure_policy == FailurePolicyKind::Retry && self.buffer.retry_attempts == 0 {
            return Err(invalid("retry_attempts must be greater than 0 when failure_policy is 'retry'"));
        }

        if self.buffer.retry_backoff_ms > 60000 {
            return Err(invalid("retry_backoff_ms must be at most 60000"));
        }

        // Validate watchdog timing
        if self.watchdog.heartbeat_timeout_ms == 0 || self.watchdog.heartbeat_timeout_ms > 600000 {
            return Err(invalid("heartbeat_timeout_ms must be between 1 and 600000"));
        }

        if self.watchdog.poll_interval_ms == 0 || self.watchdog.poll_interval_ms > 60000 {
            return Err(invalid("poll_interval_ms must be between 1 and 60000"));
        }

        // Validate sample naming
        check_name("measurement", &self.telemetry.measurement)?;
        check_name("source_tag", &self.telemetry.source_tag)?;

        // Battery parameters only matter when the simulator runs
        if self.battery.enabled {
            let battery = &self.battery;

            if !(battery.capacity_ah > 0.0) {
                return Err(invalid("battery capacity_ah must be greater than 0"));
            }

            if !(battery.voltage_empty < battery.voltage_full) || battery.voltage_empty < 0.0 {
                return Err(invalid("battery voltage_empty must be >= 0 and less than voltage_full"));
            }

            if !(battery.internal_resistance >= 0.0) {
                return Err(invalid("battery internal_resistance must be >= 0"));
            }

            if !(0.0..=1.0).contains(&battery.initial_soc) {
                return Err(invalid("battery initial_soc must be between 0.0 and 1.0"));
            }

            if !(battery.noise_std >= 0.0) || !battery.noise_std.is_finite() {
                return Err(invalid("battery noise_std must be >= 0"));
            }

            if !battery.load_current_a.is_finite() {
                return Err(invalid("battery load_current_a must be finite"));
            }

            if !(battery.step_s > 0.0) || !battery.step_s.is_finite() {
                return Err(invalid("battery step_s must be greater than 0"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> RelayError {
    RelayError::Config(msg.into())
}

fn check_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(invalid(format!("{} cannot be empty", what)));
    }

    if value.contains(RESERVED_NAME_CHARS) {
        return Err(invalid(format!(
            "{} '{}' cannot contain commas, spaces, '=' or line breaks",
            what, value
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Config {
        Config::default()
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[link]
port = "/dev/ttyUSB0"

[influx]
host = "144.22.131.217"
org = "Innomaker"
bucket = "Innoboat"
token = "abc"

[buffer]
capacity = 10
failure_policy = "retry"

[watchdog]
heartbeat_system_id = 255

[telemetry]

[battery]
enabled = true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.port, "/dev/ttyUSB0");
        assert_eq!(config.influx.port, 8086);
        assert_eq!(config.buffer.capacity, 10);
        assert_eq!(
            config.buffer.policy(),
            FailurePolicy::RetryNTimes { attempts: 3, backoff: Duration::from_millis(500) }
        );
        assert_eq!(config.watchdog.heartbeat_system_id, Some(255));
        assert!(config.battery.enabled);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.buffer.capacity, 20);
        assert_eq!(config.buffer.policy(), FailurePolicy::DropOnFailure);
        assert_eq!(config.watchdog.heartbeat_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/vessel-relay.toml");
        assert!(matches!(result, Err(RelayError::Io(_))));
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = Config::from_toml("[buffer]\ncapacity = \"lots\"");
        assert!(matches!(result, Err(RelayError::Toml(_))));
    }

    #[test]
    fn test_unknown_failure_policy_rejected() {
        let result = Config::from_toml("[buffer]\nfailure_policy = \"forever\"");
        assert!(matches!(result, Err(RelayError::Toml(_))));
    }

    #[test]
    fn test_zero_capacity() {
        let mut config = create_valid_config();
        config.buffer.capacity = 0;
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_zero_queue_depth() {
        let mut config = create_valid_config();
        config.buffer.queue_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_without_attempts() {
        let mut config = create_valid_config();
        config.buffer.failure_policy = FailurePolicyKind::Retry;
        config.buffer.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_heartbeat_timeout() {
        let mut config = create_valid_config();
        config.watchdog.heartbeat_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(RelayError::Config(_))));
    }

    #[test]
    fn test_heartbeat_timeout_too_high() {
        let mut config = create_valid_config();
        config.watchdog.heartbeat_timeout_ms = 600001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = create_valid_config();
        config.watchdog.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_link_port() {
        let mut config = create_valid_config();
        config.link.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = create_valid_config();
        config.link.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in VALID_BAUD_RATES {
            let mut config = create_valid_config();
            config.link.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_influx_timeout_bounds() {
        let mut config = create_valid_config();
        config.influx.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.influx.timeout_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_influx_host() {
        let mut config = create_valid_config();
        config.influx.host = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_measurement_with_reserved_characters() {
        for bad in ["", "my vessel", "a,b", "a=b"] {
            let mut config = create_valid_config();
            config.telemetry.measurement = bad.to_string();
            assert!(config.validate().is_err(), "measurement {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_source_tag_with_space() {
        let mut config = create_valid_config();
        config.telemetry.source_tag = "Pix hawk".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_checked_only_when_enabled() {
        let mut config = create_valid_config();
        config.battery.capacity_ah = 0.0;
        assert!(config.validate().is_ok());

        config.battery.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_voltage_order() {
        let mut config = create_valid_config();
        config.battery.enabled = true;
        config.battery.voltage_empty = 60.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_initial_soc_range() {
        let mut config = create_valid_config();
        config.battery.enabled = true;
        config.battery.initial_soc = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_negative_noise() {
        let mut config = create_valid_config();
        config.battery.enabled = true;
        config.battery.noise_std = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_zero_step() {
        let mut config = create_valid_config();
        config.battery.enabled = true;
        config.battery.step_s = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_battery_params_conversion() {
        let params = BatteryConfig::default().params();
        assert_eq!(params.capacity_as, 18000.0);
        assert_eq!(params.voltage_full, 54.6);
        assert_eq!(params.noise_std, 0.0);
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_link_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 57600);
        assert_eq!(default_influx_port(), 8086);
        assert_eq!(default_influx_timeout_ms(), 5000);
        assert_eq!(default_buffer_capacity(), 20);
        assert_eq!(default_queue_depth(), 64);
        assert_eq!(default_failure_policy(), FailurePolicyKind::Drop);
        assert_eq!(default_retry_attempts(), 3);
        assert_eq!(default_retry_backoff_ms(), 500);
        assert_eq!(default_heartbeat_timeout_ms(), 5000);
        assert_eq!(default_poll_interval_ms(), 100);
        assert_eq!(default_target_system(), 1);
        assert_eq!(default_target_component(), 1);
        assert_eq!(default_measurement(), "vessel");
        assert_eq!(default_source_tag(), "Pixhawk");
        assert_eq!(default_capacity_ah(), 5.0);
        assert_eq!(default_voltage_full(), 54.6);
        assert_eq!(default_voltage_empty(), 48.0);
        assert_eq!(default_internal_resistance(), 0.1);
        assert_eq!(default_initial_soc(), 1.0);
        assert_eq!(default_load_current_a(), 5.0);
        assert_eq!(default_step_s(), 5.0);
        assert_eq!(default_log_level(), "info");
    }
}
