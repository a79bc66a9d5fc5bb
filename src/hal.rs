//! Analog front-end primitives.
//!
//! The instrument logic only ever touches the hardware through these three
//! traits: take one raw ADC sample, emit one raw DAC code, and wait. Any
//! type implementing all three is a [`FrontEnd`].

use std::time::Duration;

/// The two ADC inputs placed on either side of the shunt resistor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    /// Output side of the shunt.
    PositiveSense,
    /// Load side of the shunt; this is the voltage delivered to the load.
    NegativeSense,
}

/// Single-sample analog input.
pub trait AnalogInput {
    fn read_raw(&mut self, channel: AnalogChannel) -> u16;
}

/// Single-sample analog output.
pub trait AnalogOutput {
    fn write_raw(&mut self, code: u16);
}

/// Blocking delay.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Everything the sampler and the setpoint correctors need.
pub trait FrontEnd: AnalogInput + AnalogOutput + Delay {}

impl<T: AnalogInput + AnalogOutput + Delay> FrontEnd for T {}

/// `Delay` backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
}
