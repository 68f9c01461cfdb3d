//! One-pole lowpass and the resonant two-pole built from two of them.

use std::f32::consts::PI;

/// Tangent-prewarped one-pole lowpass.
#[derive(Debug, Clone)]
pub struct OnePoleLowpass {
    coeff: f32,
    z1: f32,
    cutoff: f32,
    sample_rate: f32,
}

impl OnePoleLowpass {
    pub fn new(sample_rate: f32) -> Self {
        let mut lp = OnePoleLowpass {
            coeff: 1.0,
            z1: 0.0,
            cutoff: 1000.0,
            sample_rate,
        };
        lp.update();
        lp
    }

    /// Set cutoff in Hz. Normalized cutoff is clamped to `[1e-4, 0.4999]`.
    pub fn set_cutoff(&mut self, cutoff: f32, sample_rate: f32) {
        if cutoff != self.cutoff || sample_rate != self.sample_rate {
            self.cutoff = cutoff;
            self.sample_rate = sample_rate;
            self.update();
        }
    }

    fn update(&mut self) {
        let fc = if self.sample_rate > 0.0 {
            (self.cutoff / self.sample_rate).clamp(0.0001, 0.4999)
        } else {
            0.4999
        };
        let wc = (PI * fc).tan();
        self.coeff = wc / (1.0 + wc);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.z1 = self.coeff * input + (1.0 - self.coeff) * self.z1;
        self.z1
    }

    /// Last output.
    pub fn value(&self) -> f32 {
        self.z1
    }

    pub fn coefficient(&self) -> f32 {
        self.coeff
    }

    pub fn reset(&mut self) {
        self.z1 = 0.0;
    }
}

/// Two cascaded one-poles with resonance feedback from the second stage.
///
/// Stable for resonance in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct TwoPoleLowpass {
    lp1: OnePoleLowpass,
    lp2: OnePoleLowpass,
    resonance: f32,
}

impl TwoPoleLowpass {
    pub fn new(sample_rate: f32) -> Self {
        TwoPoleLowpass {
            lp1: OnePoleLowpass::new(sample_rate),
            lp2: OnePoleLowpass::new(sample_rate),
            resonance: 0.0,
        }
    }

    pub fn set_params(&mut self, cutoff: f32, resonance: f32, sample_rate: f32) {
        self.lp1.set_cutoff(cutoff, sample_rate);
        self.lp2.set_cutoff(cutoff, sample_rate);
        self.resonance = resonance.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let feedback = self.lp2.value() * self.resonance * 0.4;
        let stage1 = self.lp1.process(input - feedback);
        self.lp2.process(stage1)
    }

    pub fn reset(&mut self) {
        self.lp1.reset();
        self.lp2.reset();
    }
}
