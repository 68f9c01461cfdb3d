//! Mono source placed in an eight-speaker cube, with a tone-shaped send and
//! a stereo return spread over the same gains.

use crate::dsp::panner::{vbap_gains, Position, SPEAKER_COUNT};
use crate::dsp::tone::ToneFilter;
use crate::dsp::ProcessArgs;
use crate::error::CoreError;
use crate::params::{DisplayFormatter, ParamSpec};
use crate::state::{ModuleState, Persist};

const CV_SCALE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialParams {
    pub position: Position,
    /// Input level, 0..1.
    pub level: f32,
    /// Bipolar tone knob, -1..1.
    pub tone: f32,
    /// Send amount, 0..1.
    pub send: f32,
    /// Tap the send before the level control.
    pub send_pre_level: bool,
}

impl Default for SpatialParams {
    fn default() -> Self {
        SpatialParams {
            position: Position::new(0.0, 0.0, 0.0),
            level: 0.7,
            tone: 0.0,
            send: 0.0,
            send_pre_level: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialInputs {
    pub audio: f32,
    pub x_cv: Option<f32>,
    pub y_cv: Option<f32>,
    pub z_cv: Option<f32>,
    pub tone_cv: Option<f32>,
    pub return_left: f32,
    pub return_right: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialOutputs {
    /// Speaker feeds in [`crate::dsp::panner::SPEAKERS`] order.
    pub speakers: [f32; SPEAKER_COUNT],
    pub send: f32,
}

#[derive(Debug, Clone)]
pub struct SpatialPanner {
    pub params: SpatialParams,
    tone: ToneFilter,
}

const PARAMS: [ParamSpec; 6] = [
    ParamSpec::plain("X Position", -1.0, 1.0, 0.0, ""),
    ParamSpec::plain("Y Position", -1.0, 1.0, 0.0, ""),
    ParamSpec::plain("Z Position", -1.0, 1.0, 0.0, ""),
    ParamSpec::new("Level", 0.0, 1.0, 0.7, DisplayFormatter::Percentage),
    ParamSpec::new(
        "Filter",
        -1.0,
        1.0,
        0.0,
        DisplayFormatter::ThresholdTable {
            entries: &[(-0.001, "Lowpass"), (0.001, "Off"), (1.0, "Highpass")],
        },
    ),
    ParamSpec::new("Send", 0.0, 1.0, 0.0, DisplayFormatter::Percentage),
];

#[inline]
fn modulate(knob: f32, cv: Option<f32>) -> f32 {
    match cv {
        Some(v) => (knob + v * CV_SCALE).clamp(-1.0, 1.0),
        None => knob,
    }
}

impl SpatialPanner {
    pub fn new(sample_rate: f32) -> Self {
        SpatialPanner {
            params: SpatialParams::default(),
            tone: ToneFilter::new(sample_rate),
        }
    }

    pub fn params() -> &'static [ParamSpec] {
        &PARAMS
    }

    pub fn process(&mut self, args: &ProcessArgs, inputs: &SpatialInputs) -> SpatialOutputs {
        let p = &self.params;
        let position = Position::new(
            modulate(p.position.x, inputs.x_cv),
            modulate(p.position.y, inputs.y_cv),
            modulate(p.position.z, inputs.z_cv),
        );
        let tone = modulate(p.tone, inputs.tone_cv);

        let leveled = inputs.audio * p.level.clamp(0.0, 1.0);
        let send_source = if p.send_pre_level { inputs.audio } else { leveled };
        let send = send_source * p.send.clamp(0.0, 1.0);

        self.tone.set_knob(tone, args.sample_rate);
        let shaped = self.tone.process(leveled);

        let gains = vbap_gains(position);
        let mut speakers = [0.0; SPEAKER_COUNT];
        for (i, (out, g)) in speakers.iter_mut().zip(gains).enumerate() {
            let ret = if i % 2 == 0 { inputs.return_left } else { inputs.return_right };
            *out = (shaped + ret) * g;
        }
        SpatialOutputs { speakers, send }
    }

    pub fn reset(&mut self) {
        self.tone.reset();
    }
}

impl Persist for SpatialPanner {
    fn save_state(&self) -> ModuleState {
        let mut state = ModuleState::new();
        state.set_bool("sendPreLevel", self.params.send_pre_level);
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        if let Some(pre) = state.bool("sendPreLevel")? {
            self.params.send_pre_level = pre;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::panner::SPEAKERS;

    const SR: f32 = 48000.0;

    #[test]
    fn centred_source_reaches_every_speaker_equally() {
        let args = ProcessArgs::new(SR);
        let mut pan = SpatialPanner::new(SR);
        let out = pan.process(
            &args,
            &SpatialInputs {
                audio: 1.0,
                ..Default::default()
            },
        );
        let expected = 0.7 / (SPEAKER_COUNT as f32).sqrt();
        for s in out.speakers {
            assert!((s - expected).abs() < 1e-5, "{s} vs {expected}");
        }
        assert_eq!(out.send, 0.0);
    }

    #[test]
    fn cv_moves_the_source() {
        let args = ProcessArgs::new(SR);
        let mut pan = SpatialPanner::new(SR);
        let inputs = SpatialInputs {
            audio: 1.0,
            x_cv: Some(-10.0),
            ..Default::default()
        };
        let out = pan.process(&args, &inputs);
        for (i, speaker) in SPEAKERS.iter().enumerate() {
            if speaker.x > 0.0 {
                assert_eq!(out.speakers[i], 0.0, "right speaker {i} faded out at hard left");
            }
        }
    }

    #[test]
    fn returns_split_left_and_right() {
        let args = ProcessArgs::new(SR);
        let mut pan = SpatialPanner::new(SR);
        let out = pan.process(
            &args,
            &SpatialInputs {
                return_left: 1.0,
                ..Default::default()
            },
        );
        for (i, s) in out.speakers.iter().enumerate() {
            if i % 2 == 0 {
                assert!(*s > 0.0);
            } else {
                assert_eq!(*s, 0.0);
            }
        }
    }

    #[test]
    fn send_follows_level_unless_pre() {
        let args = ProcessArgs::new(SR);
        let mut pan = SpatialPanner::new(SR);
        pan.params.send = 0.5;
        pan.params.level = 0.5;
        let inputs = SpatialInputs {
            audio: 2.0,
            ..Default::default()
        };
        assert!((pan.process(&args, &inputs).send - 0.5).abs() < 1e-6);
        pan.params.send_pre_level = true;
        assert!((pan.process(&args, &inputs).send - 1.0).abs() < 1e-6);
    }

    #[test]
    fn lowpass_tone_darkens_the_source() {
        let args = ProcessArgs::new(SR);
        let mut pan = SpatialPanner::new(SR);
        pan.params.tone = -0.99;
        let mut peak = 0.0_f32;
        for n in 0..4800 {
            // Nyquist-rate square wave, far above the ~240 Hz cutoff.
            let audio = if n % 2 == 0 { 1.0 } else { -1.0 };
            let out = pan.process(
                &args,
                &SpatialInputs {
                    audio,
                    ..Default::default()
                },
            );
            if n > 1000 {
                peak = peak.max(out.speakers[0].abs());
            }
        }
        assert!(peak < 0.01, "peak {peak}");
    }

    #[test]
    fn runs_at_the_lowest_sample_rate() {
        let args = ProcessArgs::new(1.0);
        let mut pan = SpatialPanner::new(args.sample_rate);
        pan.params.tone = 0.5;
        let out = pan.process(
            &args,
            &SpatialInputs {
                audio: 1.0,
                ..Default::default()
            },
        );
        assert!(out.speakers.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn state_round_trip() {
        let mut pan = SpatialPanner::new(SR);
        pan.params.send_pre_level = true;
        let state = pan.save_state();
        let mut other = SpatialPanner::new(SR);
        other.load_state(&state).unwrap();
        assert!(other.params.send_pre_level);
    }
}
