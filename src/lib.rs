//! # Bench Source-Measure Unit Simulator Library
//!
//! This library contains the firmware logic of a small source-measure unit
//! that speaks a subset of SCPI over a serial line. It frames incoming bytes
//! into lines, interprets them against the instrument state, drives the
//! analog output toward voltage or current setpoints with fixed-pass
//! closed-loop correction, and reports averaged measurements.
//!
//! The hardware is reached only through the traits in [`hal`]; [`sim`]
//! provides a resistive-load model of the board for host runs and tests.
//!
//! ```text
//! bytes ─▶ LineFramer ─▶ Command::parse ─▶ Instrument
//!                                            ├─ query:  sampler ─▶ reply
//!                                            └─ action: corrector ─▶ DAC
//! ```

pub mod command;
pub mod config;
pub mod corrector;
pub mod error;
pub mod framer;
pub mod hal;
pub mod instrument;
pub mod sampler;
pub mod session;
pub mod sim;

pub use command::Command;
pub use config::{BoardConfig, Config};
pub use error::{CommandError, SimError, SimResult};
pub use framer::LineFramer;
pub use hal::{AnalogChannel, AnalogInput, AnalogOutput, Delay, FrontEnd, StdDelay};
pub use instrument::{Instrument, InstrumentState, MeasurementMode, SourceMode};
pub use session::{Session, REPLY_TERMINATOR};
pub use sim::SimulatedBoard;
