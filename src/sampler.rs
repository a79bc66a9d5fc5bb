//! Averaging sampler.
//!
//! Raw ADC counts are accumulated across all samples and scaled to volts once:
//! `sum * reference_voltage / (2^adc_bits - 1) / samples`.

use crate::config::BoardConfig;
use crate::hal::{AnalogChannel, AnalogInput};

/// Samples averaged by a `:READ?` measurement.
pub const READ_SAMPLES: u32 = 100;

/// Samples averaged inside each correction pass.
pub const CORRECTION_SAMPLES: u32 = 10;

/// Mean voltages of both sense inputs taken over the same iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensePair {
    pub positive: f64,
    pub negative: f64,
}

impl SensePair {
    /// Signed current through the shunt, positive when flowing into the load.
    pub fn current(&self, shunt_ohms: f64) -> f64 {
        (self.positive - self.negative) / shunt_ohms
    }
}

fn scale(board: &BoardConfig, sum: u64, samples: u32) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    sum as f64 * board.reference_voltage / board.adc_full_scale() / samples as f64
}

/// Mean voltage of one channel over `samples` reads.
pub fn average_volts<A: AnalogInput + ?Sized>(
    input: &mut A,
    board: &BoardConfig,
    channel: AnalogChannel,
    samples: u32,
) -> f64 {
    let sum: u64 = (0..samples).map(|_| input.read_raw(channel) as u64).sum();
    scale(board, sum, samples)
}

/// Mean voltages of both sense inputs, read alternately.
pub fn average_pair<A: AnalogInput + ?Sized>(
    input: &mut A,
    board: &BoardConfig,
    samples: u32,
) -> SensePair {
    let mut positive = 0u64;
    let mut negative = 0u64;
    for _ in 0..samples {
        positive += input.read_raw(AnalogChannel::PositiveSense) as u64;
        negative += input.read_raw(AnalogChannel::NegativeSense) as u64;
    }
    SensePair {
        positive: scale(board, positive, samples),
        negative: scale(board, negative, samples),
    }
}

/// Mean shunt current in amps.
pub fn average_current<A: AnalogInput + ?Sized>(
    input: &mut A,
    board: &BoardConfig,
    samples: u32,
) -> f64 {
    average_pair(input, board, samples).current(board.shunt_ohms)
}
