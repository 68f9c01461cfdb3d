//! Biquad filter and multi-band peak EQ stack.
//!
//! Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson),
//! run in Direct Form II Transposed. Coefficients are only recomputed when a
//! parameter actually changes.

use std::f64::consts::PI;

use crate::error::{CoreError, StateError};
use crate::state::{ModuleState, Persist};

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peaking,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadCoefficients {
    /// Pass-through filter.
    pub const IDENTITY: BiquadCoefficients = BiquadCoefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Design a section from cookbook parameters.
    ///
    /// Frequency is clamped to `[1 Hz, 0.49·fs]` and Q floored at 1e-3.
    /// A sample rate too low to hold that range, or a degenerate `a0`,
    /// yields [`Self::IDENTITY`].
    pub fn design(filter_type: FilterType, frequency: f64, q: f64, gain_db: f64, sample_rate: f64) -> Self {
        if sample_rate.is_nan() || sample_rate * 0.49 < 1.0 {
            return Self::IDENTITY;
        }
        let frequency = frequency.clamp(1.0, sample_rate * 0.49);
        let q = q.max(1e-3);

        let w0 = 2.0 * PI * frequency / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                let b0 = b1 / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                let b1 = -(1.0 + cos_w0);
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Peaking => {
                let a_lin = 10.0_f64.powf(gain_db / 40.0);
                (
                    1.0 + alpha * a_lin,
                    -2.0 * cos_w0,
                    1.0 - alpha * a_lin,
                    1.0 + alpha / a_lin,
                    -2.0 * cos_w0,
                    1.0 - alpha / a_lin,
                )
            }
        };

        if a0.abs() < 1e-12 {
            return Self::IDENTITY;
        }

        // Normalize by a0
        BiquadCoefficients {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }
}

/// Delay line of one DF-II-T section.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    z1: f64,
    z2: f64,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, c: &BiquadCoefficients, input: f64) -> f64 {
        let output = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * output + self.z2;
        self.z2 = c.b2 * input - c.a2 * output;
        output
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// A biquad IIR filter (2nd order).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    frequency: f64,
    q: f64,
    gain_db: f64, // only used for Peaking
    sample_rate: f64,

    coeffs: BiquadCoefficients,
    state: BiquadState,
    dirty: bool,
    updates: u32,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: 1000.0,
            q: 0.707, // Butterworth
            gain_db: 0.0,
            sample_rate,
            coeffs: BiquadCoefficients::IDENTITY,
            state: BiquadState::default(),
            dirty: true,
            updates: 0,
        };
        f.update_coefficients();
        f
    }

    /// Create a filter with specific parameters.
    pub fn with_params(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64, gain_db: f64) -> Self {
        let mut f = Self::new(filter_type, sample_rate);
        f.set_params(frequency, q, gain_db);
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    pub fn update_coefficients(&mut self) {
        self.coeffs =
            BiquadCoefficients::design(self.filter_type, self.frequency, self.q, self.gain_db, self.sample_rate);
        self.updates = self.updates.wrapping_add(1);
        self.dirty = false;
    }

    /// Process a single sample through the filter.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.dirty {
            self.update_coefficients();
        }
        self.state.process(&self.coeffs, input as f64) as f32
    }

    /// Reset filter state.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Set frequency, Q and gain; coefficients are marked dirty only on change.
    pub fn set_params(&mut self, frequency: f64, q: f64, gain_db: f64) {
        if frequency != self.frequency || q != self.q || gain_db != self.gain_db {
            self.frequency = frequency;
            self.q = q;
            self.gain_db = gain_db;
            self.dirty = true;
        }
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.set_params(frequency, self.q, self.gain_db);
    }

    pub fn set_q(&mut self, q: f64) {
        self.set_params(self.frequency, q, self.gain_db);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.dirty = true;
        }
    }

    /// Switch response type. The delay line is zeroed so the old state
    /// does not leak a DC step into the new response.
    pub fn set_type(&mut self, filter_type: FilterType) {
        if filter_type != self.filter_type {
            self.filter_type = filter_type;
            self.state.reset();
            self.dirty = true;
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

/// One peaking band of an [`EqStack`].
#[derive(Debug, Clone)]
pub struct EqBand {
    frequency: f64,
    q: f64,
    gain_db: f64,
    coeffs: BiquadCoefficients,
    dirty: bool,
}

impl EqBand {
    fn new(frequency: f64, q: f64) -> Self {
        EqBand {
            frequency,
            q,
            gain_db: 0.0,
            coeffs: BiquadCoefficients::IDENTITY,
            dirty: true,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }
}

/// Multi-band peaking EQ over several independent channels.
///
/// Each band holds one coefficient set shared by every channel; each
/// (channel, band) pair owns its own delay line.
#[derive(Debug, Clone)]
pub struct EqStack {
    bands: Vec<EqBand>,
    states: Vec<BiquadState>,
    channels: usize,
    sample_rate: f64,
    /// Gain range in dB accepted by [`EqStack::set_gain`].
    pub gain_range: f64,
    updates: u32,
}

impl EqStack {
    /// Build a stack from band centre frequencies, all at the same Q and 0 dB.
    pub fn new(frequencies: &[f64], q: f64, channels: usize, sample_rate: f64) -> Self {
        let channels = channels.max(1);
        EqStack {
            bands: frequencies.iter().map(|&f| EqBand::new(f, q)).collect(),
            states: vec![BiquadState::default(); channels * frequencies.len()],
            channels,
            sample_rate,
            gain_range: 24.0,
            updates: 0,
        }
    }

    /// Octave-spaced bands starting at 31.25 Hz.
    pub fn octave_bands(count: usize, channels: usize, sample_rate: f64) -> Self {
        let freqs: Vec<f64> = (0..count).map(|i| 31.25 * 2.0_f64.powi(i as i32)).collect();
        Self::new(&freqs, 1.41, channels, sample_rate)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn band(&self, index: usize) -> Option<&EqBand> {
        self.bands.get(index)
    }

    /// Set a band's gain (clamped to ±`gain_range`); ignored for unknown bands.
    pub fn set_gain(&mut self, band: usize, gain_db: f64) {
        let range = self.gain_range.abs();
        let gain_db = gain_db.clamp(-range, range);
        if let Some(b) = self.bands.get_mut(band) {
            if b.gain_db != gain_db {
                b.gain_db = gain_db;
                b.dirty = true;
            }
        }
    }

    pub fn set_frequency(&mut self, band: usize, frequency: f64) {
        if let Some(b) = self.bands.get_mut(band) {
            if b.frequency != frequency {
                b.frequency = frequency;
                b.dirty = true;
            }
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            for b in &mut self.bands {
                b.dirty = true;
            }
            log::debug!("eq stack: sample rate changed to {sample_rate}");
        }
    }

    /// Recompute only the bands whose parameters changed.
    pub fn update_coefficients(&mut self) {
        for b in self.bands.iter_mut().filter(|b| b.dirty) {
            b.coeffs = BiquadCoefficients::design(FilterType::Peaking, b.frequency, b.q, b.gain_db, self.sample_rate);
            b.dirty = false;
            self.updates = self.updates.wrapping_add(1);
        }
    }

    /// Run one sample of `channel` through every band.
    /// Unknown channels pass through untouched.
    #[inline]
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        if channel >= self.channels {
            return input;
        }
        self.update_coefficients();
        let n = self.bands.len();
        let states = &mut self.states[channel * n..(channel + 1) * n];
        let mut y = input as f64;
        for (band, state) in self.bands.iter().zip(states.iter_mut()) {
            if band.gain_db != 0.0 {
                y = state.process(&band.coeffs, y);
            }
        }
        y as f32
    }

    /// Current band gains in dB, band order.
    pub fn gains(&self) -> Vec<f64> {
        self.bands.iter().map(|b| b.gain_db).collect()
    }

    pub fn reset(&mut self) {
        for s in &mut self.states {
            s.reset();
        }
    }
}

impl Persist for EqStack {
    fn save_state(&self) -> ModuleState {
        let mut state = ModuleState::new();
        state.set_float_array("bandGains", self.gains());
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        if let Some(gains) = state.float_array("bandGains")? {
            if gains.len() > self.bands.len() {
                return Err(StateError::LengthMismatch {
                    key: "bandGains".to_string(),
                    expected: self.bands.len(),
                    found: gains.len(),
                }
                .into());
            }
            for (i, g) in gains.iter().enumerate() {
                self.set_gain(i, *g);
            }
        }
        Ok(())
    }
}
