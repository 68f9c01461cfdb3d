//! Minimal percussion synthesis: pitch-swept sine and band-passed noise
//! voices sharing one exponential VCA envelope.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Sound source of a [`DrumVoice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynthMode {
    Sine,
    Noise,
}

/// Voice slot within a kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Timeline,
    Foundation,
    Groove,
    Lead,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Timeline, Role::Foundation, Role::Groove, Role::Lead];

    pub fn index(self) -> usize {
        match self {
            Role::Timeline => 0,
            Role::Foundation => 1,
            Role::Groove => 2,
            Role::Lead => 3,
        }
    }
}

const SILENCE: f32 = 0.0001;
const BPF_Q: f32 = 2.0;
const SATURATION_GAIN: f32 = 1.6;
/// `1 / tanh(1.6)`, so a full-scale sine still peaks at 1 after saturation.
const SATURATION_NORM: f32 = 0.9217;

/// One percussion voice.
#[derive(Debug, Clone)]
pub struct DrumVoice {
    mode: SynthMode,
    freq: f32,
    /// Base decay in milliseconds, before velocity scaling.
    decay_ms: f32,
    actual_decay_ms: f32,
    velocity: f32,
    sweep: f32,
    bend: f32,

    envelope: f32,
    decay_coeff: f32,
    phase: f32,
    pitch_time: f32,
    sample_rate: f32,

    // Band-pass (Direct Form II)
    z1: f32,
    z2: f32,
    b0: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    cached_freq: f32,
    cached_rate: f32,

    rng: fastrand::Rng,
}

impl DrumVoice {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_seed(sample_rate, 0x5eed)
    }

    /// Voice whose noise source starts from a fixed seed.
    pub fn with_seed(sample_rate: f32, seed: u64) -> Self {
        let mut v = DrumVoice {
            mode: SynthMode::Sine,
            freq: 100.0,
            decay_ms: 200.0,
            actual_decay_ms: 200.0,
            velocity: 1.0,
            sweep: 0.0,
            bend: 1.0,
            envelope: 0.0,
            decay_coeff: 0.0,
            phase: 0.0,
            pitch_time: 0.0,
            sample_rate: sample_rate.max(1.0),
            z1: 0.0,
            z2: 0.0,
            b0: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            cached_freq: -1.0,
            cached_rate: -1.0,
            rng: fastrand::Rng::with_seed(seed),
        };
        v.update_bandpass();
        v.update_decay_coeff();
        v
    }

    /// Configure the whole voice at once.
    pub fn set_params(&mut self, mode: SynthMode, freq: f32, decay_ms: f32, sweep: f32, bend: f32) {
        self.set_mode(mode);
        self.set_freq(freq);
        self.set_decay(decay_ms);
        self.set_sweep(sweep);
        self.set_bend(bend);
    }

    pub fn set_mode(&mut self, mode: SynthMode) {
        self.mode = mode;
    }

    /// Frequency in Hz, clamped to `[20, 20000]`.
    pub fn set_freq(&mut self, freq: f32) {
        self.freq = freq.clamp(20.0, 20000.0);
    }

    /// Base decay in milliseconds, clamped to `[1, 5000]`.
    pub fn set_decay(&mut self, decay_ms: f32) {
        self.decay_ms = decay_ms.clamp(1.0, 5000.0);
    }

    /// Pitch sweep depth in Hz; zero disables the sweep.
    pub fn set_sweep(&mut self, sweep: f32) {
        self.sweep = sweep.max(0.0);
    }

    /// Pitch sweep speed, clamped to `[0.1, 10]`.
    pub fn set_bend(&mut self, bend: f32) {
        self.bend = bend.clamp(0.1, 10.0);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let sample_rate = sample_rate.max(1.0);
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.update_decay_coeff();
        }
    }

    /// Strike the voice. The envelope jumps straight to `velocity` and the
    /// decay is shortened for soft hits by `0.1 + 0.9·v^1.5`.
    pub fn trigger(&mut self, velocity: f32) {
        self.velocity = velocity.clamp(0.0, 1.0);
        self.envelope = self.velocity;
        // Quarter phase starts the sine at its peak for a click transient.
        self.phase = 0.25;
        self.z1 = 0.0;
        self.z2 = 0.0;
        self.pitch_time = 0.0;
        self.actual_decay_ms = self.decay_ms * (0.1 + 0.9 * self.velocity.powf(1.5));
        self.update_decay_coeff();
    }

    fn update_decay_coeff(&mut self) {
        let decay_samples = (self.actual_decay_ms / 1000.0) * self.sample_rate;
        self.decay_coeff = (-1.0 / decay_samples.max(1e-3)).exp();
    }

    fn update_bandpass(&mut self) {
        if self.freq == self.cached_freq && self.sample_rate == self.cached_rate {
            return;
        }
        let omega = 2.0 * PI * self.freq.min(self.sample_rate * 0.49) / self.sample_rate;
        let alpha = omega.sin() / (2.0 * BPF_Q);
        let a0 = 1.0 + alpha;
        self.b0 = alpha / a0;
        self.b2 = -alpha / a0;
        self.a1 = -2.0 * omega.cos() / a0;
        self.a2 = (1.0 - alpha) / a0;
        self.cached_freq = self.freq;
        self.cached_rate = self.sample_rate;
    }

    #[inline]
    fn bandpass(&mut self, input: f32) -> f32 {
        let w = input - self.a1 * self.z1 - self.a2 * self.z2;
        let y = self.b0 * w + self.b2 * self.z2;
        self.z2 = self.z1;
        self.z1 = w;
        y
    }

    /// Render one sample; silent voices return 0 without touching state.
    #[inline]
    pub fn process(&mut self) -> f32 {
        if !self.is_active() {
            return 0.0;
        }

        let output = match self.mode {
            SynthMode::Sine => {
                let mut freq = self.freq;
                if self.sweep > 0.0 {
                    let tau = 0.015 / self.bend;
                    freq += self.sweep * (-self.pitch_time / tau).exp();
                    self.pitch_time += 1.0 / self.sample_rate;
                }
                let mut out = (2.0 * PI * self.phase).sin();
                self.phase += freq / self.sample_rate;
                if self.phase >= 1.0 {
                    self.phase -= 1.0;
                }
                if self.sweep > 0.0 {
                    out = (SATURATION_GAIN * out).tanh() * SATURATION_NORM;
                }
                out
            }
            SynthMode::Noise => {
                self.update_bandpass();
                let noise = self.rng.f32() * 2.0 - 1.0;
                self.bandpass(noise)
            }
        };

        self.envelope *= self.decay_coeff;
        output * self.envelope
    }

    pub fn is_active(&self) -> bool {
        self.envelope >= SILENCE
    }

    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Velocity-scaled decay of the last trigger, in milliseconds.
    pub fn actual_decay_ms(&self) -> f32 {
        self.actual_decay_ms
    }

    pub fn mode(&self) -> SynthMode {
        self.mode
    }

    pub fn freq(&self) -> f32 {
        self.freq
    }

    pub fn decay_ms(&self) -> f32 {
        self.decay_ms
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
        self.phase = 0.0;
        self.pitch_time = 0.0;
        self.z1 = 0.0;
        self.z2 = 0.0;
    }
}

/// Preset for one voice slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoicePreset {
    pub mode: SynthMode,
    pub freq: f32,
    pub decay_ms: f32,
    pub sweep: f32,
    pub bend: f32,
}

const fn sine(freq: f32, decay_ms: f32) -> VoicePreset {
    VoicePreset { mode: SynthMode::Sine, freq, decay_ms, sweep: 0.0, bend: 1.0 }
}

const fn kick(freq: f32, decay_ms: f32, sweep: f32, bend: f32) -> VoicePreset {
    VoicePreset { mode: SynthMode::Sine, freq, decay_ms, sweep, bend }
}

const fn noise(freq: f32, decay_ms: f32) -> VoicePreset {
    VoicePreset { mode: SynthMode::Noise, freq, decay_ms, sweep: 0.0, bend: 1.0 }
}

/// A four-voice kit tuned after a musical tradition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StylePreset {
    pub name: &'static str,
    /// Voices in [`Role`] order.
    pub voices: [VoicePreset; 4],
}

const PRESETS: [StylePreset; 10] = [
    StylePreset {
        name: "West African",
        voices: [sine(800.0, 48.0), sine(80.0, 180.0), sine(250.0, 72.0), noise(2000.0, 36.0)],
    },
    StylePreset {
        name: "Afro-Cuban",
        voices: [sine(1200.0, 18.0), sine(120.0, 120.0), sine(280.0, 60.0), noise(3000.0, 48.0)],
    },
    StylePreset {
        name: "Brazilian",
        voices: [sine(1000.0, 30.0), sine(60.0, 210.0), sine(400.0, 36.0), noise(4000.0, 24.0)],
    },
    StylePreset {
        name: "Balkan",
        voices: [noise(5000.0, 24.0), sine(100.0, 150.0), sine(300.0, 48.0), noise(2500.0, 30.0)],
    },
    StylePreset {
        name: "Indian",
        voices: [sine(2000.0, 120.0), sine(70.0, 240.0), sine(350.0, 90.0), sine(500.0, 60.0)],
    },
    StylePreset {
        name: "Gamelan",
        voices: [sine(600.0, 300.0), sine(100.0, 700.0), sine(800.0, 180.0), sine(1200.0, 240.0)],
    },
    StylePreset {
        name: "Jazz",
        voices: [noise(8000.0, 100.0), sine(55.0, 180.0), noise(2000.0, 90.0), noise(10000.0, 30.0)],
    },
    StylePreset {
        name: "Electronic",
        voices: [noise(9000.0, 24.0), kick(50.0, 240.0, 120.0, 0.8), noise(1500.0, 60.0), noise(6000.0, 120.0)],
    },
    StylePreset {
        name: "Breakbeat",
        voices: [noise(8000.0, 18.0), kick(60.0, 150.0, 140.0, 1.0), noise(2500.0, 72.0), noise(4000.0, 36.0)],
    },
    StylePreset {
        name: "Techno",
        voices: [noise(10000.0, 15.0), kick(45.0, 210.0, 160.0, 1.2), noise(1800.0, 48.0), noise(3500.0, 30.0)],
    },
];

pub static STYLE_PRESETS: [StylePreset; 10] = PRESETS;

/// Preset names in index order.
pub const STYLE_NAMES: [&str; 10] = {
    let mut names = [""; 10];
    let mut i = 0;
    while i < PRESETS.len() {
        names[i] = PRESETS[i].name;
        i += 1;
    }
    names
};

/// Four voices mixed through a soft limiter.
#[derive(Debug, Clone)]
pub struct DrumSynth {
    voices: [DrumVoice; 4],
}

impl DrumSynth {
    pub fn new(sample_rate: f32) -> Self {
        DrumSynth {
            voices: std::array::from_fn(|i| DrumVoice::with_seed(sample_rate, 0x5eed + i as u64)),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        for v in &mut self.voices {
            v.set_sample_rate(sample_rate);
        }
    }

    pub fn voice(&self, role: Role) -> &DrumVoice {
        &self.voices[role.index()]
    }

    pub fn voice_mut(&mut self, role: Role) -> &mut DrumVoice {
        &mut self.voices[role.index()]
    }

    pub fn trigger(&mut self, role: Role, velocity: f32) {
        self.voices[role.index()].trigger(velocity);
    }

    /// Load a style by index; out-of-range indices are ignored.
    /// Returns whether a preset was applied.
    pub fn apply_style(&mut self, index: usize) -> bool {
        let Some(preset) = STYLE_PRESETS.get(index) else {
            return false;
        };
        for (voice, p) in self.voices.iter_mut().zip(preset.voices.iter()) {
            voice.set_params(p.mode, p.freq, p.decay_ms, p.sweep, p.bend);
        }
        log::debug!("drum synth: style {index} ({})", preset.name);
        true
    }

    /// Mixed output, `tanh(0.5·Σ)`.
    #[inline]
    pub fn process(&mut self) -> f32 {
        let sum: f32 = self.voices.iter_mut().map(|v| v.process()).sum();
        (sum * 0.5).tanh()
    }

    /// Unmixed output, one sample per [`Role`].
    #[inline]
    pub fn process_separate(&mut self) -> [f32; 4] {
        let mut out = [0.0; 4];
        for (o, v) in out.iter_mut().zip(self.voices.iter_mut()) {
            *o = v.process();
        }
        out
    }

    pub fn reset(&mut self) {
        for v in &mut self.voices {
            v.reset();
        }
    }
}

/// Stereo base positions per [`Role`], scaled by the spread control.
pub const PAN_POSITIONS: [f32; 4] = [-0.5, 0.0, 0.3, 0.7];

/// Equal-power gains for `pan` in `[-1, 1]`.
#[inline]
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * PI;
    (angle.cos(), angle.sin())
}

/// Sum separate voice outputs into a stereo pair, before limiting.
#[inline]
pub fn spread_mix(outputs: &[f32; 4], spread: f32) -> (f32, f32) {
    let mut left = 0.0;
    let mut right = 0.0;
    for (out, pos) in outputs.iter().zip(PAN_POSITIONS) {
        let (gl, gr) = pan_gains(pos * spread);
        left += out * gl;
        right += out * gr;
    }
    (left, right)
}
