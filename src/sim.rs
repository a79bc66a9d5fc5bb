//! Simulated analog front end.
//!
//! The DAC drives the positive-sense node; a series shunt connects it to the
//! negative-sense node, and the load sits between that node and ground.
//!
//! ```text
//!  DAC ──┬── shunt ──┬── load ── GND
//!        │           │
//!   PositiveSense  NegativeSense
//! ```

use crate::config::{BoardConfig, Config};
use crate::hal::{AnalogChannel, AnalogInput, AnalogOutput, Delay, StdDelay};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SimulatedBoard {
    board: BoardConfig,
    load_ohms: Option<f64>,
    noise_volts: f64,
    rng: StdRng,
    code: u16,
    max_code_written: u16,
    writes: u64,
    waited_ms: u64,
    realtime: Option<StdDelay>,
}

impl SimulatedBoard {
    /// Builds a board with the given load and no noise.
    pub fn new(board: BoardConfig, load_ohms: Option<f64>) -> Self {
        Self {
            board,
            load_ohms,
            noise_volts: 0.0,
            rng: StdRng::seed_from_u64(0),
            code: 0,
            max_code_written: 0,
            writes: 0,
            waited_ms: 0,
            realtime: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut sim = Self::new(config.board, config.simulation.load_ohms);
        sim.noise_volts = config.simulation.noise_volts;
        sim.rng = StdRng::seed_from_u64(config.simulation.seed);
        sim
    }

    /// Makes `delay_ms` actually sleep instead of only accounting for the time.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime.then_some(StdDelay);
        self
    }

    pub fn set_load_ohms(&mut self, load_ohms: Option<f64>) {
        self.load_ohms = load_ohms;
    }

    pub fn load_ohms(&self) -> Option<f64> {
        self.load_ohms
    }

    pub fn dac_code(&self) -> u16 {
        self.code
    }

    /// Highest code ever written to the DAC.
    pub fn max_code_written(&self) -> u16 {
        self.max_code_written
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Total time requested through `Delay`.
    pub fn waited_ms(&self) -> u64 {
        self.waited_ms
    }

    pub fn output_volts(&self) -> f64 {
        self.board.code_to_volts(self.code)
    }

    /// True current through shunt and load.
    pub fn load_current(&self) -> f64 {
        match self.load_ohms {
            Some(load) => self.output_volts() / (load + self.board.shunt_ohms),
            None => 0.0,
        }
    }

    /// True voltage across the load.
    pub fn load_volts(&self) -> f64 {
        match self.load_ohms {
            Some(load) => self.load_current() * load,
            None => self.output_volts(),
        }
    }

    fn quantize(&self, volts: f64) -> u16 {
        let full_scale = self.board.adc_full_scale();
        (volts / self.board.reference_voltage * full_scale)
            .round()
            .clamp(0.0, full_scale) as u16
    }
}

impl AnalogInput for SimulatedBoard {
    fn read_raw(&mut self, channel: AnalogChannel) -> u16 {
        let mut volts = match channel {
            AnalogChannel::PositiveSense => self.output_volts(),
            AnalogChannel::NegativeSense => self.load_volts(),
        };
        if self.noise_volts > 0.0 {
            volts += self.rng.gen_range(-self.noise_volts..=self.noise_volts);
        }
        self.quantize(volts)
    }
}

impl AnalogOutput for SimulatedBoard {
    fn write_raw(&mut self, code: u16) {
        let code = code.min(self.board.dac_full_scale() as u16);
        self.code = code;
        self.max_code_written = self.max_code_written.max(code);
        self.writes += 1;
    }
}

impl Delay for SimulatedBoard {
    fn delay_ms(&mut self, ms: u32) {
        self.waited_ms += ms as u64;
        if let Some(delay) = self.realtime.as_mut() {
            delay.delay_ms(ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divider_splits_output_across_shunt_and_load() {
        let board = BoardConfig::default();
        let mut sim = SimulatedBoard::new(board, Some(96.6));
        sim.write_raw(board.volts_to_code(2.0));
        assert!((sim.load_volts() - sim.output_volts() / 2.0).abs() < 1e-12);
        assert!((sim.load_current() - sim.output_volts() / 193.2).abs() < 1e-12);
    }

    #[test]
    fn open_circuit_carries_no_current() {
        let board = BoardConfig::default();
        let mut sim = SimulatedBoard::new(board, None);
        sim.write_raw(500);
        assert_eq!(sim.load_current(), 0.0);
        assert_eq!(
            sim.read_raw(AnalogChannel::PositiveSense),
            sim.read_raw(AnalogChannel::NegativeSense)
        );
    }

    #[test]
    fn out_of_range_code_saturates() {
        let board = BoardConfig::default();
        let mut sim = SimulatedBoard::new(board, Some(1000.0));
        sim.write_raw(u16::MAX);
        assert_eq!(sim.dac_code(), 1023);
        assert_eq!(sim.read_raw(AnalogChannel::PositiveSense), 4095);
    }

    #[test]
    fn noisy_reads_stay_near_truth() {
        let mut config = Config::default();
        config.simulation.noise_volts = 0.01;
        let mut sim = SimulatedBoard::from_config(&config);
        sim.write_raw(config.board.volts_to_code(1.0));
        let truth = sim.quantize(sim.load_volts()) as i32;
        for _ in 0..50 {
            let raw = sim.read_raw(AnalogChannel::NegativeSense) as i32;
            assert!((raw - truth).abs() <= 14);
        }
    }

    #[test]
    fn delay_is_accounted_without_sleeping() {
        let mut sim = SimulatedBoard::new(BoardConfig::default(), None);
        sim.delay_ms(250);
        sim.delay_ms(5);
        assert_eq!(sim.waited_ms(), 255);
    }
}
