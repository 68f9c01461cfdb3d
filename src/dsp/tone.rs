//! Bipolar tone knob: lowpass sweep below centre, highpass sweep above,
//! bypass in the dead zone.

use super::filter::{BiquadFilter, FilterType};
use super::rescale;

/// Which half of the knob is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneMode {
    Bypass,
    Lowpass,
    Highpass,
}

const DEAD_ZONE: f32 = 0.001;
const BUTTERWORTH_Q: f64 = 0.707;

/// Two cascaded biquads (12 dB + 12 dB) driven by one knob in `[-1, 1]`.
///
/// Below `-0.001` the knob sweeps a lowpass from 20 Hz (fully left) to
/// 22 kHz (centre); above `+0.001` it sweeps a highpass from 10 Hz (centre)
/// to 8 kHz (fully right). Both sections are zeroed whenever the mode flips.
#[derive(Debug, Clone)]
pub struct ToneFilter {
    stages: [BiquadFilter; 2],
    mode: ToneMode,
    sample_rate: f32,
}

impl ToneFilter {
    pub fn new(sample_rate: f32) -> Self {
        let sr = sample_rate as f64;
        ToneFilter {
            stages: [
                BiquadFilter::with_params(FilterType::Lowpass, sr, 22000.0, BUTTERWORTH_Q, 0.0),
                BiquadFilter::with_params(FilterType::Lowpass, sr, 22000.0, BUTTERWORTH_Q, 0.0),
            ],
            mode: ToneMode::Bypass,
            sample_rate,
        }
    }

    /// Map a knob position to mode and cutoff (Hz); bypass reports 0 Hz.
    pub fn knob_to_cutoff(knob: f32) -> (ToneMode, f32) {
        let knob = knob.clamp(-1.0, 1.0);
        if knob < -DEAD_ZONE {
            (ToneMode::Lowpass, rescale(knob, -1.0, 0.0, 20.0, 22000.0))
        } else if knob > DEAD_ZONE {
            (ToneMode::Highpass, rescale(knob, 0.0, 1.0, 10.0, 8000.0))
        } else {
            (ToneMode::Bypass, 0.0)
        }
    }

    /// Apply a knob position at control rate.
    pub fn set_knob(&mut self, knob: f32, sample_rate: f32) {
        let (mode, cutoff) = Self::knob_to_cutoff(knob);
        if mode != self.mode {
            self.mode = mode;
            let ty = match mode {
                ToneMode::Highpass => FilterType::Highpass,
                _ => FilterType::Lowpass,
            };
            for stage in &mut self.stages {
                stage.set_type(ty);
                stage.reset();
            }
        }
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            for stage in &mut self.stages {
                stage.set_sample_rate(sample_rate as f64);
            }
        }
        if mode != ToneMode::Bypass {
            for stage in &mut self.stages {
                stage.set_frequency(cutoff as f64);
            }
        }
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        match self.mode {
            ToneMode::Bypass => input,
            _ => {
                let y = self.stages[0].process(input);
                self.stages[1].process(y)
            }
        }
    }

    pub fn mode(&self) -> ToneMode {
        self.mode
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}
