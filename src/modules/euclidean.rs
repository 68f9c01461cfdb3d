//! Three-track Euclidean sequencer following an external clock.
//!
//! The clock period is measured between rising edges; each track then runs
//! its own step clock at that period divided or multiplied by its ratio.

use crate::dsp::euclid::{EuclideanPattern, MAX_STEPS};
use crate::dsp::gate::{PulseGenerator, SchmittTrigger, SlewLimiter};
use crate::dsp::ProcessArgs;
use crate::params::{DisplayFormatter, ParamSpec};

pub const TRACKS: usize = 3;

const GATE_VOLTS: f32 = 10.0;
const TRIGGER_LENGTH: f32 = 0.001;
const MASTER_GAIN: f32 = 0.4;
const DEFAULT_PERIOD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackParams {
    /// Pattern length, 1..32 steps.
    pub length: f32,
    /// Fill as a percentage of the length, 0..100.
    pub fill: f32,
    /// Rotation, 0..31 steps (clamped to `length - 1`).
    pub shift: f32,
    /// Clock ratio, -3..3: positive multiplies, negative divides.
    pub div_mult: f32,
    pub length_cv_amount: f32,
    pub fill_cv_amount: f32,
    pub shift_cv_amount: f32,
    /// Gate slew times in seconds, 0..0.1.
    pub rise: f32,
    pub fall: f32,
}

impl Default for TrackParams {
    fn default() -> Self {
        TrackParams {
            length: 16.0,
            fill: 25.0,
            shift: 0.0,
            div_mult: 0.0,
            length_cv_amount: 0.0,
            fill_cv_amount: 0.0,
            shift_cv_amount: 0.0,
            rise: 0.0,
            fall: 0.0,
        }
    }
}

impl TrackParams {
    /// Resolve knobs and CV into `(length, fill, shift)`.
    fn resolve(&self, cv: &TrackCv) -> (usize, usize, i32) {
        let length_cv = cv.length.map_or(0.0, |v| v * self.length_cv_amount);
        let length = (self.length + length_cv).clamp(1.0, MAX_STEPS as f32).round() as usize;

        let fill_cv = cv.fill.map_or(0.0, |v| v * self.fill_cv_amount * 10.0);
        let percent = (self.fill + fill_cv).clamp(0.0, 100.0);
        let fill = (percent / 100.0 * length as f32).round() as usize;

        let shift_cv = cv.shift.map_or(0.0, |v| v * self.shift_cv_amount);
        let shift = (self.shift + shift_cv).clamp(0.0, length as f32 - 1.0).round() as i32;

        (length, fill, shift)
    }
}

/// Track interval for a clock ratio: `+n` runs `n + 1` times faster, `-n`
/// runs `n + 1` times slower.
pub fn ratio_interval(period: f32, div_mult: i32) -> f32 {
    match div_mult {
        d if d > 0 => period / (d + 1) as f32,
        d if d < 0 => period * (-d + 1) as f32,
        _ => period,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrackCv {
    pub length: Option<f32>,
    pub fill: Option<f32>,
    pub shift: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanInputs {
    pub clock: Option<f32>,
    pub reset: Option<f32>,
    pub cv: [TrackCv; TRACKS],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanOutputs {
    /// Slewed gates, 0..10 V.
    pub gates: [f32; TRACKS],
    pub triggers: [f32; TRACKS],
    /// `0.4 · Σ gates`.
    pub master: f32,
    /// 10 V while any track trigger is high.
    pub master_trigger: f32,
}

#[derive(Debug, Clone)]
struct Track {
    pattern: EuclideanPattern,
    clock: f32,
    interval: f32,
    step: usize,
    gate: bool,
    slew: SlewLimiter,
    pulse: PulseGenerator,
}

impl Track {
    fn new() -> Self {
        Track {
            pattern: EuclideanPattern::default(),
            clock: 0.0,
            interval: DEFAULT_PERIOD,
            step: 0,
            gate: false,
            slew: SlewLimiter::new(),
            pulse: PulseGenerator::new(),
        }
    }

    fn rewind(&mut self) {
        self.clock = 0.0;
        self.step = 0;
        self.gate = false;
        self.slew.reset();
    }
}

#[derive(Debug, Clone)]
pub struct EuclideanSequencer {
    pub tracks: [TrackParams; TRACKS],
    state: [Track; TRACKS],
    clock_trigger: SchmittTrigger,
    reset_trigger: SchmittTrigger,
    time: f64,
    last_clock: Option<f64>,
    period: f32,
}

const PARAMS: [ParamSpec; 9] = [
    ParamSpec::new("Div/Mult", -3.0, 3.0, 0.0, DisplayFormatter::DivMult),
    ParamSpec::new("Length", 1.0, 32.0, 16.0, DisplayFormatter::Plain { unit: "", decimals: 0 }),
    ParamSpec::new("Fill", 0.0, 100.0, 25.0, DisplayFormatter::Plain { unit: "%", decimals: 0 }),
    ParamSpec::new("Shift", 0.0, 31.0, 0.0, DisplayFormatter::Plain { unit: "", decimals: 0 }),
    ParamSpec::plain("Length CV", -1.0, 1.0, 0.0, ""),
    ParamSpec::plain("Fill CV", -1.0, 1.0, 0.0, ""),
    ParamSpec::plain("Shift CV", -1.0, 1.0, 0.0, ""),
    ParamSpec::new("Rise", 0.0, 0.1, 0.0, DisplayFormatter::Time),
    ParamSpec::new("Fall", 0.0, 0.1, 0.0, DisplayFormatter::Time),
];

impl Default for EuclideanSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl EuclideanSequencer {
    pub fn new() -> Self {
        EuclideanSequencer {
            tracks: [TrackParams::default(); TRACKS],
            state: std::array::from_fn(|_| Track::new()),
            clock_trigger: SchmittTrigger::new(),
            reset_trigger: SchmittTrigger::new(),
            time: 0.0,
            last_clock: None,
            period: DEFAULT_PERIOD,
        }
    }

    /// Per-track knobs.
    pub fn params() -> &'static [ParamSpec] {
        &PARAMS
    }

    /// Measured clock period in seconds.
    pub fn period(&self) -> f32 {
        self.period
    }

    /// Current step of a track.
    pub fn step(&self, track: usize) -> Option<usize> {
        self.state.get(track).map(|t| t.step)
    }

    pub fn pattern(&self, track: usize) -> Option<&EuclideanPattern> {
        self.state.get(track).map(|t| &t.pattern)
    }

    pub fn process(&mut self, args: &ProcessArgs, inputs: &EuclideanInputs) -> EuclideanOutputs {
        self.time += args.sample_time as f64;

        let clocked = inputs.clock.is_some();
        if let Some(v) = inputs.clock {
            if self.clock_trigger.process(v) {
                if let Some(last) = self.last_clock {
                    self.period = ((self.time - last) as f32).clamp(0.01, 10.0);
                }
                self.last_clock = Some(self.time);
            }
        }
        if inputs.reset.is_some_and(|v| self.reset_trigger.process(v)) {
            self.rewind();
        }

        let mut out = EuclideanOutputs::default();
        for (i, (track, p)) in self.state.iter_mut().zip(self.tracks.iter()).enumerate() {
            track.interval = ratio_interval(self.period, p.div_mult.round() as i32);
            let (length, fill, shift) = p.resolve(&inputs.cv[i]);
            track.pattern.configure(length, fill, shift);
            track.slew.set_times(p.rise, p.fall);

            track.clock += args.sample_time;
            if track.clock >= track.interval {
                track.clock -= track.interval;
                track.step = (track.step + 1) % track.pattern.length();
                track.gate = track.pattern.step(track.step);
                if track.gate && clocked {
                    track.pulse.trigger(TRIGGER_LENGTH);
                }
            }

            let raw = if track.gate && clocked && track.clock < track.interval * 0.5 {
                GATE_VOLTS
            } else {
                0.0
            };
            out.gates[i] = track.slew.process(args.sample_time, raw);
            out.triggers[i] = if track.pulse.process(args.sample_time) { GATE_VOLTS } else { 0.0 };
        }

        out.master = out.gates.iter().sum::<f32>() * MASTER_GAIN;
        out.master_trigger = if out.triggers.iter().any(|&t| t > 0.0) { GATE_VOLTS } else { 0.0 };
        out
    }

    /// Rewind every track to its first step (reset input or button).
    pub fn rewind(&mut self) {
        for track in &mut self.state {
            track.rewind();
        }
    }

    pub fn reset(&mut self) {
        self.rewind();
        for track in &mut self.state {
            track.pulse.reset();
        }
        self.clock_trigger.reset();
        self.reset_trigger.reset();
        self.last_clock = None;
        self.period = DEFAULT_PERIOD;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 1000.0;

    /// Drive the sequencer with a clock of `period_samples`, returning
    /// per-sample outputs.
    fn run(seq: &mut EuclideanSequencer, period_samples: usize, samples: usize) -> Vec<EuclideanOutputs> {
        let args = ProcessArgs::new(SR);
        (0..samples)
            .map(|n| {
                let clock = if n % period_samples < 5 { 10.0 } else { 0.0 };
                seq.process(
                    &args,
                    &EuclideanInputs {
                        clock: Some(clock),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn measures_clock_period() {
        let mut seq = EuclideanSequencer::new();
        run(&mut seq, 250, 1000);
        assert!((seq.period() - 0.25).abs() < 1e-3, "period {}", seq.period());
    }

    #[test]
    fn ratio_intervals() {
        assert_eq!(ratio_interval(0.6, 0), 0.6);
        assert!((ratio_interval(0.6, 2) - 0.2).abs() < 1e-6);
        assert!((ratio_interval(0.6, -2) - 1.8).abs() < 1e-6);
    }

    #[test]
    fn fill_percent_and_shift_clamp() {
        let p = TrackParams {
            length: 8.0,
            fill: 50.0,
            shift: 20.0,
            ..Default::default()
        };
        assert_eq!(p.resolve(&TrackCv::default()), (8, 4, 7));

        let p = TrackParams {
            fill_cv_amount: 1.0,
            ..Default::default()
        };
        let cv = TrackCv {
            fill: Some(10.0),
            ..Default::default()
        };
        assert_eq!(p.resolve(&cv).1, 16, "fill CV saturates at 100%");
    }

    #[test]
    fn full_fill_gates_every_step_for_half_the_interval() {
        let mut seq = EuclideanSequencer::new();
        for t in &mut seq.tracks {
            t.fill = 100.0;
        }
        let out = run(&mut seq, 500, 3000);
        // After the first full step at the default 0.5 s interval, the gate is
        // high for the first half of each step.
        let high = out[1000..2000].iter().filter(|o| o.gates[0] == GATE_VOLTS).count();
        assert!((495..=505).contains(&high), "gate high for {high} of 1000 samples");
        let master = out[1000..2000].iter().map(|o| o.master).fold(0.0_f32, f32::max);
        assert!((master - 3.0 * GATE_VOLTS * MASTER_GAIN).abs() < 1e-4);
        let triggers = out[1000..2000].iter().filter(|o| o.master_trigger > 0.0).count();
        assert!((1..=4).contains(&triggers), "two 1 ms triggers, got {triggers} samples");
    }

    #[test]
    fn no_clock_means_no_output() {
        let args = ProcessArgs::new(SR);
        let mut seq = EuclideanSequencer::new();
        seq.tracks[0].fill = 100.0;
        for _ in 0..2000 {
            let out = seq.process(&args, &EuclideanInputs::default());
            assert_eq!(out.gates[0], 0.0);
            assert_eq!(out.triggers[0], 0.0);
        }
        assert!(seq.step(0).unwrap() > 0, "tracks keep counting without a clock");
    }

    #[test]
    fn reset_input_rewinds() {
        let args = ProcessArgs::new(SR);
        let mut seq = EuclideanSequencer::new();
        run(&mut seq, 100, 2000);
        assert_ne!(seq.step(0), Some(0));
        seq.process(
            &args,
            &EuclideanInputs {
                clock: Some(0.0),
                reset: Some(10.0),
                ..Default::default()
            },
        );
        assert_eq!(seq.step(0), Some(0));
    }

    #[test]
    fn slewed_gate_rises_gradually() {
        let mut seq = EuclideanSequencer::new();
        seq.tracks[0].fill = 100.0;
        seq.tracks[0].rise = 0.05;
        let out = run(&mut seq, 500, 1200);
        let first_high = out
            .iter()
            .position(|o| o.gates[0] > 0.0)
            .expect("gate should open");
        assert!(out[first_high].gates[0] < 1.0, "slewed gate starts low");
    }

    #[test]
    fn pattern_follows_params() {
        let mut seq = EuclideanSequencer::new();
        seq.tracks[1].length = 8.0;
        seq.tracks[1].fill = 37.5;
        run(&mut seq, 100, 10);
        let p = seq.pattern(1).unwrap();
        assert_eq!((p.length(), p.fill()), (8, 3));
    }
}
