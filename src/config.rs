//! Board, identity and host configuration.
//!
//! Every section is optional in the TOML file; missing values fall back to
//! the defaults of the reference board (3.3 V reference, 12-bit ADC,
//! 10-bit DAC, 96.6 ohm shunt).

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Reply to `*IDN?` unless overridden in the config file.
pub const DEFAULT_IDN: &str = "BENCH-SMU,SOURCE MEASURE EMULATOR,0,1.0";

/// Electrical description of the analog front end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Full-scale voltage of both the ADC and the DAC.
    pub reference_voltage: f64,
    pub adc_bits: u8,
    pub dac_bits: u8,
    /// Series resistor between the two sense inputs.
    pub shunt_ohms: f64,
    /// Settle time before each correction pass samples the inputs.
    pub settle_ms: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            adc_bits: 12,
            dac_bits: 10,
            shunt_ohms: 96.6,
            settle_ms: 5,
        }
    }
}

impl BoardConfig {
    /// Largest raw ADC count, `2^adc_bits - 1`.
    pub fn adc_full_scale(&self) -> f64 {
        ((1u32 << self.adc_bits) - 1) as f64
    }

    /// Largest DAC code, `2^dac_bits - 1`.
    pub fn dac_full_scale(&self) -> f64 {
        ((1u32 << self.dac_bits) - 1) as f64
    }

    /// Clamps a voltage to `[0, reference_voltage]`.
    pub fn clamp_output(&self, volts: f64) -> f64 {
        if volts.is_nan() {
            return 0.0;
        }
        volts.clamp(0.0, self.reference_voltage)
    }

    /// Converts an output voltage to a DAC code, clamping first.
    pub fn volts_to_code(&self, volts: f64) -> u16 {
        let volts = self.clamp_output(volts);
        (volts / self.reference_voltage * self.dac_full_scale()).round() as u16
    }

    /// Physical output level produced by a DAC code.
    pub fn code_to_volts(&self, code: u16) -> f64 {
        let code = (code as f64).min(self.dac_full_scale());
        code * self.reference_voltage / self.dac_full_scale()
    }

    fn validate(&self) -> SimResult<()> {
        if !(self.reference_voltage > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "reference_voltage must be positive, got {}",
                self.reference_voltage
            )));
        }
        if !(self.shunt_ohms > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "shunt_ohms must be positive, got {}",
                self.shunt_ohms
            )));
        }
        for (name, bits) in [("adc_bits", self.adc_bits), ("dac_bits", self.dac_bits)] {
            if !(1..=16).contains(&bits) {
                return Err(SimError::InvalidConfig(format!(
                    "{} must be within 1..=16, got {}",
                    name, bits
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub idn: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            idn: DEFAULT_IDN.to_string(),
        }
    }
}

/// What the simulated board has wired to its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Load resistance to ground; `None` leaves the output open.
    pub load_ohms: Option<f64>,
    /// Peak amplitude of uniform noise added to every ADC sample.
    pub noise_volts: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            load_ohms: Some(1000.0),
            noise_volts: 0.0,
            seed: 0x5EED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub identity: IdentityConfig,
    pub simulation: SimulationConfig,
    pub serial: SerialConfig,
}

impl Config {
    /// Reads and validates a TOML config file.
    pub fn load(path: &Path) -> SimResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SimError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> SimResult<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.board.validate()?;
        if let Some(load) = self.simulation.load_ohms {
            if !(load >= 0.0) {
                return Err(SimError::InvalidConfig(format!(
                    "load_ohms must not be negative, got {}",
                    load
                )));
            }
        }
        if !(self.simulation.noise_volts >= 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "noise_volts must not be negative, got {}",
                self.simulation.noise_volts
            )));
        }
        Ok(())
    }
}
