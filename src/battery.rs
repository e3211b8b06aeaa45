//! # Battery Simulator
//!
//! Discrete-time charge/discharge model of the vessel's traction battery.
//!
//! The pack is modelled as a linear open-circuit voltage curve between the
//! empty and full voltages, in series with a fixed internal resistance. When
//! the pack runs flat the simulator switches to charging and stays there until
//! it is full again, so a long-running relay produces a sawtooth instead of a
//! flat line at zero.
//!
//! ## Usage
//!
//! ```
//! use vessel_relay::battery::{BatteryParams, BatterySim};
//!
//! let params = BatteryParams::from_amp_hours(5.0, 54.6, 48.0, 0.1);
//! let mut battery = BatterySim::new(params, 1.0)?;
//! battery.step(5.0, 5.0);
//! assert!(battery.voltage() < 54.6);
//! # Ok::<(), vessel_relay::error::RelayError>(())
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::error::{RelayError, Result};

/// SOC at or below which a discharging pack switches to charging.
pub const SOC_EMPTY_THRESHOLD: f64 = 0.005;

/// SOC at or above which a charging pack switches back to discharging.
pub const SOC_FULL_THRESHOLD: f64 = 0.995;

/// Seconds per hour, for amp-hour to amp-second conversion.
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Static battery parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryParams {
    /// Capacity in amp-seconds.
    pub capacity_as: f64,
    /// Open-circuit voltage at SOC 1.0 (V).
    pub voltage_full: f64,
    /// Open-circuit voltage at SOC 0.0 (V).
    pub voltage_empty: f64,
    /// Internal resistance (ohms).
    pub internal_resistance: f64,
    /// Standard deviation of the Gaussian voltage noise (V). Zero disables noise.
    pub noise_std: f64,
}

impl BatteryParams {
    /// Build parameters from a capacity given in amp-hours, without noise.
    pub fn from_amp_hours(
        capacity_ah: f64,
        voltage_full: f64,
        voltage_empty: f64,
        internal_resistance: f64,
    ) -> Self {
        Self {
            capacity_as: capacity_ah * SECONDS_PER_HOUR,
            voltage_full,
            voltage_empty,
            internal_resistance,
            noise_std: 0.0,
        }
    }

    /// Set the voltage noise standard deviation.
    #[must_use]
    pub fn with_noise(mut self, noise_std: f64) -> Self {
        self.noise_std = noise_std;
        self
    }

    /// Linear open-circuit voltage at the given state of charge.
    pub fn open_circuit_voltage(&self, soc: f64) -> f64 {
        self.voltage_empty + (self.voltage_full - self.voltage_empty) * soc
    }
}

/// Direction the simulated current flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryMode {
    Discharging,
    Charging,
}

/// Battery charge/discharge state machine.
///
/// Invariants held across any sequence of calls:
/// - `state_of_charge()` stays within `[0, 1]`
/// - `voltage()` is never negative
#[derive(Debug)]
pub struct BatterySim {
    params: BatteryParams,
    soc: f64,
    voltage: f64,
    mode: BatteryMode,
    noise: Option<Normal<f64>>,
    rng: StdRng,
}

impl BatterySim {
    /// Create a simulator starting at `initial_soc` (clamped to `[0, 1]`).
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Config` if the capacity is not positive or the
    /// noise standard deviation is negative or not finite.
    pub fn new(params: BatteryParams, initial_soc: f64) -> Result<Self> {
        Self::with_rng(params, initial_soc, StdRng::from_entropy())
    }

    /// Create a simulator with a fixed noise seed, for reproducible runs.
    pub fn with_seed(params: BatteryParams, initial_soc: f64, seed: u64) -> Result<Self> {
        Self::with_rng(params, initial_soc, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: BatteryParams, initial_soc: f64, rng: StdRng) -> Result<Self> {
        if !(params.capacity_as > 0.0) || !params.capacity_as.is_finite() {
            return Err(RelayError::Config(format!(
                "battery capacity must be positive, got {} As",
                params.capacity_as
            )));
        }

        let noise = if params.noise_std > 0.0 {
            let normal = Normal::new(0.0, params.noise_std).map_err(|e| {
                RelayError::Config(format!("invalid battery noise_std {}: {}", params.noise_std, e))
            })?;
            Some(normal)
        } else if params.noise_std == 0.0 {
            None
        } else {
            return Err(RelayError::Config(format!(
                "battery noise_std must be >= 0, got {}",
                params.noise_std
            )));
        };

        let mut sim = Self {
            params,
            soc: clamp_soc(initial_soc),
            voltage: 0.0,
            mode: BatteryMode::Discharging,
            noise,
            rng,
        };
        sim.voltage = sim.terminal_voltage(0.0);
        Ok(sim)
    }

    /// Advance the simulation by `dt` seconds at `load_current` amps.
    ///
    /// Positive load drains the pack while discharging. In charging mode the
    /// same current is applied with the opposite sign, refilling the pack.
    pub fn step(&mut self, load_current: f64, dt: f64) {
        if self.soc <= SOC_EMPTY_THRESHOLD && self.mode == BatteryMode::Discharging {
            self.mode = BatteryMode::Charging;
            info!(soc = self.soc, "Battery is empty, switching to charging mode");
        } else if self.soc >= SOC_FULL_THRESHOLD && self.mode == BatteryMode::Charging {
            self.mode = BatteryMode::Discharging;
            info!(soc = self.soc, "Battery is full, switching to discharging mode");
        }

        let current = match self.mode {
            BatteryMode::Charging => -load_current,
            BatteryMode::Discharging => load_current,
        };

        let capacity = self.params.capacity_as;
        let drained = current * dt;
        let charge = (self.soc * capacity - drained).clamp(0.0, capacity);
        // NaN load or dt leaves the charge where it was
        if !charge.is_nan() {
            self.soc = clamp_soc(charge / capacity);
        }

        self.voltage = self.terminal_voltage(current);
    }

    /// Latest simulated terminal voltage (V).
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Current state of charge (0.0 = empty, 1.0 = full).
    pub fn state_of_charge(&self) -> f64 {
        self.soc
    }

    /// Current charge direction.
    pub fn mode(&self) -> BatteryMode {
        self.mode
    }

    /// Reset to the given SOC and recompute the zero-load voltage.
    ///
    /// The mode is left untouched; the next `step` re-evaluates it.
    pub fn reset(&mut self, soc: f64) {
        self.soc = clamp_soc(soc);
        self.voltage = self.terminal_voltage(0.0);
    }

    fn terminal_voltage(&mut self, current: f64) -> f64 {
        let mut voltage = self.params.open_circuit_voltage(self.soc)
            - current * self.params.internal_resistance;

        if let Some(noise) = &self.noise {
            voltage += noise.sample(&mut self.rng);
        }

        // f64::max also maps NaN to 0.0
        voltage.max(0.0)
    }
}

fn clamp_soc(soc: f64) -> f64 {
    if soc.is_nan() {
        return 0.0;
    }
    soc.clamp(0.0, 1.0)
}
