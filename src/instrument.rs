//! Instrument state and command dispatch.
//!
//! One [`Instrument`] owns the front end and the [`InstrumentState`]; every
//! command runs to completion through `&mut self`, so state is never touched
//! from more than one place at a time.

use crate::command::Command;
use crate::config::{BoardConfig, Config};
use crate::corrector::{correct_current, correct_voltage};
use crate::error::CommandError;
use crate::hal::{AnalogChannel, FrontEnd};
use crate::sampler::{average_current, average_volts, READ_SAMPLES};
use log::{debug, info};

/// Quantity reported by `:READ?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementMode {
    #[default]
    Voltage,
    Current,
    Resistance,
}

impl MeasurementMode {
    /// Token used in the `:CONF?` reply.
    pub fn token(self) -> &'static str {
        match self {
            MeasurementMode::Voltage => "VOLT",
            MeasurementMode::Current => "CURR",
            MeasurementMode::Resistance => "RES",
        }
    }
}

/// Quantity the host intends to source. Recorded only; both setpoint
/// commands work in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceMode {
    #[default]
    Voltage,
    Current,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrumentState {
    pub measurement_mode: MeasurementMode,
    pub source_mode: SourceMode,
    /// Set by `:OUTP`. The source path does not consult it.
    pub output_enabled: bool,
    /// Output estimate left by the most recent setpoint correction.
    pub last_set_voltage: f64,
}

pub struct Instrument<F: FrontEnd> {
    front_end: F,
    board: BoardConfig,
    idn: String,
    state: InstrumentState,
}

impl<F: FrontEnd> Instrument<F> {
    /// Creates an instrument in its power-on state.
    pub fn new(front_end: F, board: BoardConfig, idn: impl Into<String>) -> Self {
        Self {
            front_end,
            board,
            idn: idn.into(),
            state: InstrumentState::default(),
        }
    }

    pub fn from_config(front_end: F, config: &Config) -> Self {
        Self::new(front_end, config.board, config.identity.idn.clone())
    }

    pub fn state(&self) -> &InstrumentState {
        &self.state
    }

    pub fn board(&self) -> &BoardConfig {
        &self.board
    }

    pub fn front_end(&self) -> &F {
        &self.front_end
    }

    pub fn front_end_mut(&mut self) -> &mut F {
        &mut self.front_end
    }

    /// Processes one framed line and returns the reply body, if any.
    ///
    /// Errors mean the line was dropped without touching state; callers
    /// must not reply to them.
    pub fn process_command(&mut self, line: &str) -> Result<Option<String>, CommandError> {
        let command = Command::parse(line)?;
        let kind = if command.is_query() { "query" } else { "action" };
        debug!("{} '{}' -> {:?}", kind, line, command);
        Ok(self.execute_command(command))
    }

    /// Executes a parsed command and returns the reply body for queries.
    pub fn execute_command(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Identify => Some(self.idn.clone()),
            Command::QueryConfiguration => {
                Some(format!("\"{}\"", self.state.measurement_mode.token()))
            }
            Command::Read => Some(format!("{:.6}", self.measure())),
            Command::UnknownQuery => Some(String::from("?")),
            Command::Accepted(_) | Command::Ignored => None,
            Command::SetOutput(enabled) => {
                self.state.output_enabled = enabled;
                None
            }
            Command::Configure(mode) => {
                self.state.measurement_mode = mode;
                None
            }
            Command::SourceFunction(mode) => {
                self.state.source_mode = mode;
                None
            }
            Command::SourceVoltage(target) => {
                let result = correct_voltage(&mut self.front_end, &self.board, target);
                info!(
                    "Voltage setpoint {} V: output {:.6} V ({} corrected, {} skipped)",
                    target, result.output_volts, result.corrected, result.skipped
                );
                self.state.last_set_voltage = result.output_volts;
                None
            }
            Command::SourceCurrent(target) => {
                let result = correct_current(&mut self.front_end, &self.board, target);
                info!(
                    "Current setpoint {} A: output {:.6} V",
                    target, result.output_volts
                );
                self.state.last_set_voltage = result.output_volts;
                None
            }
        }
    }

    /// Averaged reading in the current measurement mode.
    pub fn measure(&mut self) -> f64 {
        match self.state.measurement_mode {
            MeasurementMode::Voltage => average_volts(
                &mut self.front_end,
                &self.board,
                AnalogChannel::NegativeSense,
                READ_SAMPLES,
            ),
            MeasurementMode::Current => {
                average_current(&mut self.front_end, &self.board, READ_SAMPLES)
            }
            MeasurementMode::Resistance => 0.0,
        }
    }
}
