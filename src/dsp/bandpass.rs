//! Chained state-variable band-pass.

use std::f32::consts::PI;

/// One Chamberlin SVF stage; only the band-pass output is used downstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvfStage {
    low: f32,
    high: f32,
    band: f32,
}

impl SvfStage {
    #[inline]
    pub fn process(&mut self, input: f32, f: f32) -> f32 {
        self.low += f * (input - self.low);
        self.high = input - self.low;
        self.band += f * (self.high - self.band);
        self.band
    }

    pub fn reset(&mut self) {
        *self = SvfStage::default();
    }
}

/// `N` SVF stages in series sharing one tuning coefficient
/// `f = clamp(2·sin(π·fc/fs), 0, 1)`. Each stage's band output feeds the next.
#[derive(Debug, Clone)]
pub struct ChainedBandpass<const N: usize = 4> {
    stages: [SvfStage; N],
    f: f32,
    cutoff: f32,
    sample_rate: f32,
}

impl<const N: usize> ChainedBandpass<N> {
    pub fn new(cutoff: f32, sample_rate: f32) -> Self {
        let mut bp = ChainedBandpass {
            stages: [SvfStage::default(); N],
            f: 0.0,
            cutoff,
            sample_rate,
        };
        bp.update();
        bp
    }

    /// Retune; the coefficient is only recomputed when something changed.
    pub fn set_cutoff(&mut self, cutoff: f32, sample_rate: f32) {
        if cutoff != self.cutoff || sample_rate != self.sample_rate {
            self.cutoff = cutoff;
            self.sample_rate = sample_rate;
            self.update();
        }
    }

    fn update(&mut self) {
        self.f = if self.sample_rate > 0.0 {
            (2.0 * (PI * self.cutoff.max(0.0) / self.sample_rate).sin()).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let mut x = input;
        for stage in &mut self.stages {
            x = stage.process(x, self.f);
        }
        x
    }

    pub fn coefficient(&self) -> f32 {
        self.f
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}
