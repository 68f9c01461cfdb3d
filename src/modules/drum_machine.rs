//! Four-voice world-percussion drum machine built on [`DrumSynth`].

use crate::dsp::drum::{spread_mix, DrumSynth, Role, STYLE_NAMES, STYLE_PRESETS};
use crate::dsp::gate::SchmittTrigger;
use crate::dsp::ProcessArgs;
use crate::error::{CoreError, StateError};
use crate::params::{DisplayFormatter, ParamSpec};
use crate::state::{ModuleState, Persist};

const VOICES: usize = 4;
const OUTPUT_GAIN: f32 = 5.0;
const FREQ_CV_SCALE: f32 = 0.2;
const DECAY_CV_SCALE: f32 = 0.18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Pitch offset in octaves, -1..1.
    pub pitch: f32,
    /// Decay multiplier, 0.2..2.
    pub decay: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        VoiceParams { pitch: 0.0, decay: 1.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrumMachineParams {
    /// Style preset index, 0..9.
    pub style: f32,
    /// Stereo spread, 0..1.
    pub spread: f32,
    pub voices: [VoiceParams; VOICES],
}

impl Default for DrumMachineParams {
    fn default() -> Self {
        DrumMachineParams {
            style: 0.0,
            spread: 0.5,
            voices: [VoiceParams::default(); VOICES],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceInputs {
    pub trigger: Option<f32>,
    /// Velocity CV, 0..10 V. Unpatched means full velocity.
    pub velocity: Option<f32>,
    pub freq_cv: Option<f32>,
    pub decay_cv: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DrumMachineInputs {
    pub voices: [VoiceInputs; VOICES],
    pub style_cv: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DrumMachineOutputs {
    /// Per-voice audio in [`Role`] order.
    pub voices: [f32; VOICES],
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone)]
pub struct DrumMachine {
    pub params: DrumMachineParams,
    synth: DrumSynth,
    triggers: [SchmittTrigger; VOICES],
    style: usize,
}

const PARAMS: [ParamSpec; 4] = [
    ParamSpec::new("Style", 0.0, 9.0, 0.0, DisplayFormatter::SteppedEnum { labels: &STYLE_NAMES }),
    ParamSpec::new("Spread", 0.0, 1.0, 0.5, DisplayFormatter::Percentage),
    ParamSpec::plain("Pitch", -1.0, 1.0, 0.0, "oct"),
    ParamSpec::new("Decay", 0.2, 2.0, 1.0, DisplayFormatter::Plain { unit: "x", decimals: 2 }),
];

impl DrumMachine {
    pub fn new(sample_rate: f32) -> Self {
        let mut synth = DrumSynth::new(sample_rate);
        synth.apply_style(0);
        DrumMachine {
            params: DrumMachineParams::default(),
            synth,
            triggers: std::array::from_fn(|_| SchmittTrigger::with_thresholds(0.1, 2.0)),
            style: 0,
        }
    }

    /// Style, spread, then the per-voice knobs.
    pub fn params() -> &'static [ParamSpec] {
        &PARAMS
    }

    /// Active style preset index.
    pub fn style(&self) -> usize {
        self.style
    }

    fn select_style(&mut self, style: usize) {
        if style != self.style && self.synth.apply_style(style) {
            self.style = style;
        }
    }

    pub fn process(&mut self, args: &ProcessArgs, inputs: &DrumMachineInputs) -> DrumMachineOutputs {
        let style_value = self.params.style + inputs.style_cv.unwrap_or(0.0);
        self.select_style(style_value.round().clamp(0.0, 9.0) as usize);
        self.synth.set_sample_rate(args.sample_rate);

        let preset = &STYLE_PRESETS[self.style];
        for (i, role) in Role::ALL.into_iter().enumerate() {
            let vp = &self.params.voices[i];
            let vi = &inputs.voices[i];
            let pitch = (vp.pitch + vi.freq_cv.map_or(0.0, |v| v * FREQ_CV_SCALE)).clamp(-1.0, 1.0);
            let decay = (vp.decay + vi.decay_cv.map_or(0.0, |v| v * DECAY_CV_SCALE)).clamp(0.2, 2.0);

            let base = &preset.voices[i];
            let voice = self.synth.voice_mut(role);
            voice.set_freq(base.freq * 2.0_f32.powf(pitch));
            voice.set_decay(base.decay_ms * decay);

            if let Some(v) = vi.trigger {
                if self.triggers[i].process(v) {
                    let velocity = vi.velocity.map_or(1.0, |cv| (cv / 10.0).clamp(0.0, 1.0));
                    self.synth.trigger(role, velocity);
                }
            }
        }

        let voices = self.synth.process_separate();
        let (left, right) = spread_mix(&voices, self.params.spread.clamp(0.0, 1.0));
        DrumMachineOutputs {
            voices: voices.map(|v| v * OUTPUT_GAIN),
            left: left.tanh() * OUTPUT_GAIN,
            right: right.tanh() * OUTPUT_GAIN,
        }
    }

    pub fn reset(&mut self) {
        self.synth.reset();
        for t in &mut self.triggers {
            t.reset();
        }
    }
}

impl Persist for DrumMachine {
    fn save_state(&self) -> ModuleState {
        let mut state = ModuleState::new();
        state.set_int("style", self.style as i64);
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        if let Some(style) = state.int("style")? {
            if !(0..STYLE_PRESETS.len() as i64).contains(&style) {
                return Err(StateError::OutOfRange {
                    key: "style".to_string(),
                    value: style as f64,
                }
                .into());
            }
            self.params.style = style as f32;
            self.select_style(style as usize);
        }
        Ok(())
    }
}
