//! Closed-loop setpoint correction.
//!
//! Both correctors run a fixed number of passes with no convergence check, so
//! a `:SOUR:*` command always takes the same time to complete. Every value
//! written to the DAC is clamped to `[0, reference_voltage]` first.

use crate::config::BoardConfig;
use crate::hal::FrontEnd;
use crate::sampler::{average_current, average_pair, CORRECTION_SAMPLES};
use log::trace;

pub const VOLTAGE_PASSES: u32 = 10;
pub const CURRENT_PASSES: u32 = 75;

/// Output voltage the current corrector starts from.
pub const CURRENT_START_VOLTS: f64 = 0.1;

/// Proportional gain applied to the current error.
pub const CURRENT_GAIN: f64 = 0.5;

/// Feedback voltages at or below this are treated as zero.
pub const VOLTAGE_EPSILON: f64 = 1e-3;

/// Currents at or below this are treated as zero.
pub const CURRENT_EPSILON: f64 = 1e-6;

/// Result of one complete correction run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    /// Output estimate after the last pass.
    pub output_volts: f64,
    /// Passes that rewrote the output.
    pub corrected: u32,
    /// Passes skipped on a degenerate measurement.
    pub skipped: u32,
}

fn drive<F: FrontEnd + ?Sized>(front_end: &mut F, board: &BoardConfig, volts: f64) -> f64 {
    let volts = board.clamp_output(volts);
    front_end.write_raw(board.volts_to_code(volts));
    volts
}

/// Drives the load voltage toward `target` volts.
///
/// The target itself is the first estimate. Each pass then measures the load
/// voltage `V` and shunt current `I` and multiplies the previous estimate by
/// `1 + R_shunt * I / V`. Passes where `V` is near zero are skipped and keep
/// the previous estimate.
pub fn correct_voltage<F: FrontEnd + ?Sized>(
    front_end: &mut F,
    board: &BoardConfig,
    target: f64,
) -> Correction {
    let mut estimate = drive(front_end, board, target);
    let mut corrected = 0;
    let mut skipped = 0;

    for pass in 0..VOLTAGE_PASSES {
        front_end.delay_ms(board.settle_ms);
        let sense = average_pair(front_end, board, CORRECTION_SAMPLES);
        let volts = sense.negative;
        let current = sense.current(board.shunt_ohms);

        if current.abs() > CURRENT_EPSILON {
            trace!(
                "voltage pass {}: V={:.6} I={:.9} R_eff={:.3}",
                pass,
                volts,
                current,
                volts / current
            );
        }

        if volts > VOLTAGE_EPSILON {
            estimate = drive(
                front_end,
                board,
                estimate * (1.0 + board.shunt_ohms * current / volts),
            );
            corrected += 1;
        } else {
            trace!("voltage pass {}: feedback {:.6} V too small, skipped", pass, volts);
            skipped += 1;
        }
    }

    Correction {
        output_volts: estimate,
        corrected,
        skipped,
    }
}

/// Drives the shunt current toward `target` amps.
///
/// Starts from [`CURRENT_START_VOLTS`] and each pass adds
/// `CURRENT_GAIN * (target - I) * R_shunt` to the output. The running estimate
/// is kept clamped so it cannot wind up past the output range.
pub fn correct_current<F: FrontEnd + ?Sized>(
    front_end: &mut F,
    board: &BoardConfig,
    target: f64,
) -> Correction {
    let mut estimate = drive(front_end, board, CURRENT_START_VOLTS);

    for pass in 0..CURRENT_PASSES {
        front_end.delay_ms(board.settle_ms);
        let current = average_current(front_end, board, CORRECTION_SAMPLES);
        let error = target - current;
        estimate = drive(
            front_end,
            board,
            estimate + CURRENT_GAIN * error * board.shunt_ohms,
        );
        trace!(
            "current pass {}: I={:.9} error={:.9} out={:.6}",
            pass,
            current,
            error,
            estimate
        );
    }

    Correction {
        output_volts: estimate,
        corrected: CURRENT_PASSES,
        skipped: 0,
    }
}
