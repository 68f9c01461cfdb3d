//! Three-channel attack/decay generator.
//!
//! Each channel is either a plain trigger envelope or, with its band-pass
//! enabled, a dual envelope that follows the filtered input as well.

use crate::dsp::bandpass::ChainedBandpass;
use crate::dsp::envelope::{knob_to_seconds, DualEnvelope, TriggerEnvelope};
use crate::dsp::ProcessArgs;
use crate::error::{CoreError, StateError};
use crate::params::{DisplayFormatter, ParamSpec};
use crate::state::{ModuleState, Persist};

pub const CHANNELS: usize = 3;

const DEFAULT_CUTOFFS: [f32; CHANNELS] = [200.0, 1000.0, 5000.0];
const SUM_GAIN: f32 = 0.33;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdChannelParams {
    /// Attack knob, 0..1 on the envelope time law.
    pub attack: f32,
    /// Decay knob, 0..1.
    pub decay: f32,
    pub curve: f32,
    pub bpf_enabled: bool,
    /// Band-pass cutoff, 20..8000 Hz.
    pub bpf_cutoff: f32,
    /// Output gain while the band-pass is on, 0.1..10.
    pub bpf_gain: f32,
}

impl AdChannelParams {
    fn with_cutoff(bpf_cutoff: f32) -> Self {
        AdChannelParams {
            attack: 0.1,
            decay: 0.3,
            curve: 0.0,
            bpf_enabled: false,
            bpf_cutoff,
            bpf_gain: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdParams {
    /// Bipolar offset added to every attack time (`0.5·value` seconds).
    pub attack_all: f32,
    pub decay_all: f32,
    /// Feed input 1 to all three channels.
    pub auto_route: bool,
    pub channels: [AdChannelParams; CHANNELS],
}

impl Default for AdParams {
    fn default() -> Self {
        AdParams {
            attack_all: 0.0,
            decay_all: 0.0,
            auto_route: false,
            channels: DEFAULT_CUTOFFS.map(AdChannelParams::with_cutoff),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AdOutputs {
    /// Per-channel envelopes, 0..10 V.
    pub channels: [f32; CHANNELS],
    pub sum: f32,
}

#[derive(Debug, Clone)]
struct AdChannel {
    envelope: TriggerEnvelope,
    dual: DualEnvelope,
    bpf: ChainedBandpass,
}

#[derive(Debug, Clone)]
pub struct AdGenerator {
    pub params: AdParams,
    channels: [AdChannel; CHANNELS],
}

const PARAMS: [ParamSpec; 9] = [
    ParamSpec::plain("Attack All", -1.0, 1.0, 0.0, "s"),
    ParamSpec::plain("Decay All", -1.0, 1.0, 0.0, "s"),
    ParamSpec::new(
        "Auto Route",
        0.0,
        1.0,
        0.0,
        DisplayFormatter::SteppedEnum { labels: &["Off", "On"] },
    ),
    ParamSpec::new("Attack", 0.0, 1.0, 0.1, DisplayFormatter::KnobSeconds),
    ParamSpec::new("Decay", 0.0, 1.0, 0.3, DisplayFormatter::KnobSeconds),
    ParamSpec::plain("Curve", -0.99, 0.99, 0.0, ""),
    ParamSpec::new(
        "BPF Enable",
        0.0,
        1.0,
        0.0,
        DisplayFormatter::SteppedEnum { labels: &["Off", "On"] },
    ),
    ParamSpec::plain("BPF Frequency", 20.0, 8000.0, 200.0, "Hz"),
    ParamSpec::new("BPF Gain", 0.1, 10.0, 3.0, DisplayFormatter::Plain { unit: "x", decimals: 1 }),
];

impl AdGenerator {
    pub fn new(sample_rate: f32) -> Self {
        AdGenerator {
            params: AdParams::default(),
            channels: DEFAULT_CUTOFFS.map(|cutoff| AdChannel {
                envelope: TriggerEnvelope::new(),
                dual: DualEnvelope::new(),
                bpf: ChainedBandpass::new(cutoff, sample_rate),
            }),
        }
    }

    /// Shared knobs first, then the per-channel knobs (repeated for each
    /// channel).
    pub fn params() -> &'static [ParamSpec] {
        &PARAMS
    }

    /// One sample. Unpatched trigger inputs read as 0 V.
    pub fn process(&mut self, args: &ProcessArgs, triggers: [Option<f32>; CHANNELS]) -> AdOutputs {
        let p = self.params;
        let inputs = if p.auto_route {
            [triggers[0].unwrap_or(0.0); CHANNELS]
        } else {
            triggers.map(|t| t.unwrap_or(0.0))
        };

        let mut out = AdOutputs::default();
        let mut sum = 0.0;
        for (i, (channel, cp)) in self.channels.iter_mut().zip(p.channels.iter()).enumerate() {
            let attack = knob_to_seconds(cp.attack, p.attack_all);
            let decay = knob_to_seconds(cp.decay, p.decay_all);

            let level = if cp.bpf_enabled {
                channel.bpf.set_cutoff(cp.bpf_cutoff.clamp(20.0, 8000.0), args.sample_rate);
                let filtered = channel.bpf.process(inputs[i]);
                channel.dual.set_params(attack, decay, cp.curve);
                channel.dual.process(args.sample_time, filtered) * cp.bpf_gain.clamp(0.1, 10.0)
            } else {
                channel.envelope.set_params(attack, decay, cp.curve);
                channel.envelope.process(args.sample_time, inputs[i])
            };

            let volts = (level * 10.0).clamp(0.0, 10.0);
            out.channels[i] = volts;
            sum += volts * SUM_GAIN;
        }
        out.sum = sum.clamp(0.0, 10.0);
        out
    }

    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.envelope.reset();
            channel.dual.reset();
            channel.bpf.reset();
        }
    }
}

fn channel_array(state: &ModuleState, key: &str) -> Result<Option<Vec<f64>>, CoreError> {
    let Some(values) = state.float_array(key)? else {
        return Ok(None);
    };
    if values.len() > CHANNELS {
        return Err(StateError::LengthMismatch {
            key: key.to_string(),
            expected: CHANNELS,
            found: values.len(),
        }
        .into());
    }
    Ok(Some(values))
}

impl Persist for AdGenerator {
    fn save_state(&self) -> ModuleState {
        let c = &self.params.channels;
        let mut state = ModuleState::new();
        state.set_bool("autoRouteEnabled", self.params.auto_route);
        state.set_bool_array("bpfEnabled", c.iter().map(|c| c.bpf_enabled).collect());
        state.set_float_array("bpfCutoffs", c.iter().map(|c| c.bpf_cutoff as f64).collect());
        state.set_float_array("bpfGains", c.iter().map(|c| c.bpf_gain as f64).collect());
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        let auto_route = state.bool("autoRouteEnabled")?;
        let enabled = state.bool_array("bpfEnabled")?;
        if let Some(e) = &enabled {
            if e.len() > CHANNELS {
                return Err(StateError::LengthMismatch {
                    key: "bpfEnabled".to_string(),
                    expected: CHANNELS,
                    found: e.len(),
                }
                .into());
            }
        }
        let cutoffs = channel_array(state, "bpfCutoffs")?;
        let gains = channel_array(state, "bpfGains")?;

        if let Some(a) = auto_route {
            self.params.auto_route = a;
        }
        for (i, cp) in self.params.channels.iter_mut().enumerate() {
            if let Some(e) = enabled.as_ref().and_then(|v| v.get(i)) {
                cp.bpf_enabled = *e;
            }
            if let Some(c) = cutoffs.as_ref().and_then(|v| v.get(i)) {
                cp.bpf_cutoff = (*c as f32).clamp(20.0, 8000.0);
            }
            if let Some(g) = gains.as_ref().and_then(|v| v.get(i)) {
                cp.bpf_gain = (*g as f32).clamp(0.1, 10.0);
            }
        }
        log::debug!("ad generator: state loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    /// Knob position giving an attack of 10 ms.
    const TEN_MS: f32 = 1.0 / 6.0;

    #[test]
    fn trigger_produces_ten_volt_envelope() {
        let args = ProcessArgs::new(SR);
        let mut ad = AdGenerator::new(SR);
        ad.params.channels[0].attack = TEN_MS;

        let mut peak = 0.0_f32;
        let mut peak_at = 0;
        for n in 0..4800 {
            let gate = if n < 100 { 5.0 } else { 0.0 };
            let out = ad.process(&args, [Some(gate), None, None]);
            if out.channels[0] > peak {
                peak = out.channels[0];
                peak_at = n;
            }
            assert_eq!(out.channels[1], 0.0, "unpatched channel stays silent");
        }
        assert!((peak - 10.0).abs() < 1e-3, "peak {peak}");
        assert!((479..=481).contains(&peak_at), "peak at sample {peak_at}");
    }

    #[test]
    fn auto_route_feeds_every_channel() {
        let args = ProcessArgs::new(SR);
        let mut ad = AdGenerator::new(SR);
        ad.params.auto_route = true;
        let mut last = AdOutputs::default();
        for n in 0..2000 {
            let gate = if n < 10 { 10.0 } else { 0.0 };
            last = ad.process(&args, [Some(gate), Some(0.0), None]);
        }
        assert!(last.channels.iter().all(|&v| v > 0.0));
        assert_eq!(last.channels[0], last.channels[2]);
        let expected = (last.channels.iter().sum::<f32>() * SUM_GAIN).clamp(0.0, 10.0);
        assert!((last.sum - expected).abs() < 1e-4);
    }

    #[test]
    fn band_pass_mode_follows_audio() {
        let args = ProcessArgs::new(SR);
        let mut ad = AdGenerator::new(SR);
        ad.params.channels[0].bpf_enabled = true;
        ad.params.channels[0].attack = 0.2;
        ad.params.channels[0].decay = 0.4;

        let mut peak = 0.0_f32;
        for n in 0..SR as usize / 2 {
            let t = n as f32 / SR;
            let audio = 5.0 * (2.0 * std::f32::consts::PI * 200.0 * t).sin();
            let out = ad.process(&args, [Some(audio), None, None]);
            assert!((0.0..=10.0).contains(&out.channels[0]));
            peak = peak.max(out.channels[0]);
        }
        assert!(peak > 0.1, "follower should respond to in-band audio, got {peak}");
    }

    #[test]
    fn reset_silences() {
        let args = ProcessArgs::new(SR);
        let mut ad = AdGenerator::new(SR);
        ad.process(&args, [Some(10.0), None, None]);
        ad.process(&args, [Some(10.0), None, None]);
        ad.reset();
        let out = ad.process(&args, [Some(10.0), None, None]);
        // A fresh edge after reset starts a new attack from zero.
        assert!(out.channels[0] < 1.0);
    }

    #[test]
    fn state_round_trip() {
        let mut ad = AdGenerator::new(SR);
        ad.params.auto_route = true;
        ad.params.channels[1].bpf_enabled = true;
        ad.params.channels[2].bpf_cutoff = 3000.0;
        ad.params.channels[0].bpf_gain = 0.5;

        let json = ad.save_state().to_json().unwrap();
        let mut other = AdGenerator::new(SR);
        other.load_state(&ModuleState::from_json(&json).unwrap()).unwrap();
        assert_eq!(other.params, ad.params);
    }

    #[test]
    fn partial_state_keeps_defaults() {
        let mut state = ModuleState::new();
        state.set_float_array("bpfCutoffs", vec![500.0]);
        let mut ad = AdGenerator::new(SR);
        ad.load_state(&state).unwrap();
        assert_eq!(ad.params.channels[0].bpf_cutoff, 500.0);
        assert_eq!(ad.params.channels[1].bpf_cutoff, 1000.0);
        assert!(!ad.params.auto_route);

        state.set_float_array("bpfGains", vec![1.0; 4]);
        assert!(ad.load_state(&state).is_err());
    }

    #[test]
    fn param_table() {
        let params = AdGenerator::params();
        assert_eq!(params[3].name, "Attack");
        assert_eq!(params[3].display(0.5), "1.00 s");
    }
}
