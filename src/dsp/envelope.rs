//! Attack/decay envelopes with curve shaping.
//!
//! Two independent flavors are provided: a phase-accumulator
//! [`TriggerEnvelope`] started by gate edges, and an RC-style
//! [`EnvelopeFollower`] tracking the rectified input. [`DualEnvelope`] runs
//! both on one input and outputs the larger of the two.

use super::curve::{apply_curve, smooth_decay};
use super::gate::{PulseGenerator, SchmittTrigger};

/// Envelope stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attack,
    Decay,
}

/// Map a 0..1 time knob to seconds on a six-decade log scale
/// (1 ms at 0, 1 s at 0.5, 1000 s at 1), plus half of a bipolar offset knob.
/// Never returns less than 1 ms.
pub fn knob_to_seconds(value: f32, offset: f32) -> f32 {
    let seconds = 10.0_f32.powf((value - 0.5) * 6.0) + offset * 0.5;
    seconds.max(0.001)
}

/// Attack/decay envelope driven by rising gate edges.
///
/// Output is normalized to `[0, 1]`. Every edge restarts the attack from
/// zero elapsed time, including edges arriving mid-envelope.
#[derive(Debug, Clone)]
pub struct TriggerEnvelope {
    /// Attack time in seconds.
    pub attack: f32,
    /// Decay time in seconds. Zero ends the envelope as soon as the attack does.
    pub decay: f32,
    /// Curvature in `(-1, 1)`, shared by both segments.
    pub curve: f32,

    phase: Phase,
    elapsed: f32,
    output: f32,
    trigger: SchmittTrigger,
}

impl Default for TriggerEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerEnvelope {
    pub fn new() -> Self {
        TriggerEnvelope {
            attack: 0.01,
            decay: 1.0,
            curve: 0.0,
            phase: Phase::Idle,
            elapsed: 0.0,
            output: 0.0,
            trigger: SchmittTrigger::new(),
        }
    }

    /// Create an envelope with specific times and curvature.
    pub fn with_params(attack: f32, decay: f32, curve: f32) -> Self {
        let mut env = Self::new();
        env.set_params(attack, decay, curve);
        env
    }

    pub fn set_params(&mut self, attack: f32, decay: f32, curve: f32) {
        self.attack = attack.max(0.0);
        self.decay = decay.max(0.0);
        self.curve = curve.clamp(-0.99, 0.99);
    }

    /// Replace the edge detector thresholds.
    pub fn set_thresholds(&mut self, low: f32, high: f32) {
        self.trigger = SchmittTrigger::with_thresholds(low, high);
    }

    /// Start the attack immediately.
    pub fn trigger(&mut self) {
        self.phase = Phase::Attack;
        self.elapsed = 0.0;
    }

    /// Feed one gate sample and advance by `dt` seconds.
    ///
    /// Edges only start a new cycle from idle; a running envelope ignores
    /// them so the output never jumps.
    #[inline]
    pub fn process(&mut self, dt: f32, gate: f32) -> f32 {
        if self.trigger.process(gate) && self.phase == Phase::Idle {
            self.trigger();
        }
        self.advance(dt)
    }

    /// Advance by `dt` seconds without looking at a gate.
    pub fn advance(&mut self, dt: f32) -> f32 {
        match self.phase {
            Phase::Idle => {
                self.output = 0.0;
            }
            Phase::Attack => {
                self.elapsed += dt;
                if self.elapsed >= self.attack {
                    self.phase = Phase::Decay;
                    self.elapsed = 0.0;
                    self.output = 1.0;
                } else {
                    self.output = apply_curve(self.elapsed / self.attack, self.curve);
                }
            }
            Phase::Decay => {
                self.elapsed += dt;
                if self.decay <= 0.0 || self.elapsed >= self.decay {
                    self.phase = Phase::Idle;
                    self.elapsed = 0.0;
                    self.output = 0.0;
                } else {
                    self.output = 1.0 - apply_curve(self.elapsed / self.decay, self.curve);
                }
            }
        }
        self.output = self.output.clamp(0.0, 1.0);
        self.output
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.elapsed = 0.0;
        self.output = 0.0;
        self.trigger.reset();
    }
}

/// Asymmetric RC follower of the rectified input.
///
/// The input is rectified to `|v| / 10` and smoothed with separate attack and
/// release coefficients `1 − exp(−dt / τ)`, where `τ = max(0.5 ms, 0.1·attack)`
/// while rising and `τ = max(1 ms, 0.5·release)` while falling.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    /// Attack time in seconds.
    pub attack: f32,
    /// Release time in seconds.
    pub release: f32,
    /// Curvature applied to the smoothing coefficients.
    pub curve: f32,
    state: f32,
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeFollower {
    pub fn new() -> Self {
        EnvelopeFollower {
            attack: 0.01,
            release: 1.0,
            curve: 0.0,
            state: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, dt: f32, input: f32) -> f32 {
        let attack_coeff = (1.0 - (-dt / (self.attack * 0.1).max(0.0005)).exp()).clamp(0.0, 1.0);
        let release_coeff = (1.0 - (-dt / (self.release * 0.5).max(0.001)).exp()).clamp(0.0, 1.0);

        let rectified = (input.abs() / 10.0).clamp(0.0, 1.0);
        let coeff = if rectified > self.state {
            apply_curve(attack_coeff, self.curve)
        } else {
            apply_curve(release_coeff, self.curve)
        };

        self.state += (rectified - self.state) * coeff.clamp(0.0, 1.0);
        self.state = self.state.clamp(0.0, 1.0);
        self.state
    }

    pub fn value(&self) -> f32 {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

/// Trigger envelope and follower on the same signal; output is the max.
///
/// The trigger half only sees samples above the hot-trigger level so that a
/// filtered audio signal can drive the follower without also retriggering
/// the attack on every cycle.
#[derive(Debug, Clone)]
pub struct DualEnvelope {
    pub trigger_env: TriggerEnvelope,
    pub follower: EnvelopeFollower,
    /// Absolute voltage an input must exceed to count toward an edge.
    pub hot_level: f32,
}

impl Default for DualEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl DualEnvelope {
    pub fn new() -> Self {
        DualEnvelope {
            trigger_env: TriggerEnvelope::new(),
            follower: EnvelopeFollower::new(),
            hot_level: 9.5,
        }
    }

    /// Set the shared attack, decay/release and curvature.
    pub fn set_params(&mut self, attack: f32, decay: f32, curve: f32) {
        self.trigger_env.set_params(attack, decay, curve);
        self.follower.attack = attack;
        self.follower.release = decay;
        self.follower.curve = curve.clamp(-0.99, 0.99);
    }

    #[inline]
    pub fn process(&mut self, dt: f32, input: f32) -> f32 {
        let gate = if input.abs() > self.hot_level { input.abs() } else { 0.0 };
        let triggered = self.trigger_env.process(dt, gate);
        let followed = self.follower.process(dt, input);
        triggered.max(followed)
    }

    pub fn reset(&mut self) {
        self.trigger_env.reset();
        self.follower.reset();
    }
}

/// Linear 1 ms attack into a decay shaped by [`smooth_decay`].
///
/// Each restart also fires a 30 ms trigger pulse, exposed through
/// [`SmoothDecayEnvelope::pulse`].
#[derive(Debug, Clone)]
pub struct SmoothDecayEnvelope {
    /// Decay time in seconds.
    pub decay: f32,
    /// Decay shape in `[0, 0.99]`.
    pub shape: f32,

    phase: Phase,
    elapsed: f32,
    output: f32,
    trigger: SchmittTrigger,
    pulse: PulseGenerator,
    pulse_high: bool,
}

const SMOOTH_ATTACK: f32 = 0.001;
const TRIGGER_PULSE: f32 = 0.03;

impl Default for SmoothDecayEnvelope {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothDecayEnvelope {
    pub fn new() -> Self {
        SmoothDecayEnvelope {
            decay: 1.0,
            shape: 0.5,
            phase: Phase::Idle,
            elapsed: 0.0,
            output: 0.0,
            trigger: SchmittTrigger::with_thresholds(0.1, 2.0),
            pulse: PulseGenerator::new(),
            pulse_high: false,
        }
    }

    pub fn trigger(&mut self) {
        self.phase = Phase::Attack;
        self.elapsed = 0.0;
        self.pulse.trigger(TRIGGER_PULSE);
    }

    pub fn process(&mut self, dt: f32, gate: f32) -> f32 {
        if self.trigger.process(gate) && self.phase == Phase::Idle {
            self.trigger();
        }
        self.pulse_high = self.pulse.process(dt);

        match self.phase {
            Phase::Idle => self.output = 0.0,
            Phase::Attack => {
                self.elapsed += dt;
                if self.elapsed >= SMOOTH_ATTACK {
                    self.phase = Phase::Decay;
                    self.elapsed = 0.0;
                    self.output = 1.0;
                } else {
                    self.output = self.elapsed / SMOOTH_ATTACK;
                }
            }
            Phase::Decay => {
                self.elapsed += dt;
                if self.decay <= 0.0 || self.elapsed >= self.decay {
                    self.phase = Phase::Idle;
                    self.elapsed = 0.0;
                    self.output = 0.0;
                } else {
                    self.output = smooth_decay(self.elapsed / self.decay, self.shape);
                }
            }
        }
        self.output
    }

    /// Whether the 30 ms trigger pulse is currently high.
    pub fn pulse(&self) -> bool {
        self.pulse_high
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.elapsed = 0.0;
        self.output = 0.0;
        self.trigger.reset();
        self.pulse.reset();
        self.pulse_high = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn starts_idle_and_stays_silent() {
        let mut env = TriggerEnvelope::new();
        let dt = 1.0 / SR;
        for _ in 0..(SR as usize) {
            assert_eq!(env.process(dt, 0.0), 0.0);
        }
        assert!(env.is_idle());
    }

    #[test]
    fn attack_and_decay_timing_at_48k() {
        let mut env = TriggerEnvelope::with_params(0.01, 0.3, 0.0);
        let dt = 1.0 / SR;

        let mut peak_at = None;
        let mut below_at = None;
        for i in 0..20000usize {
            let gate = if i < 10 { 5.0 } else { 0.0 };
            let out = env.process(dt, gate);
            if peak_at.is_none() && out >= 1.0 {
                peak_at = Some(i);
            }
            if peak_at.is_some() && below_at.is_none() && out < 0.01 {
                below_at = Some(i);
            }
        }

        let peak_at = peak_at.unwrap_or(usize::MAX);
        assert!(peak_at.abs_diff(480) <= 1, "peak reached at sample {peak_at}");
        let below_at = below_at.unwrap_or(usize::MAX);
        assert!(below_at <= 480 + 14400, "decay fell below 0.01 at sample {below_at}");
    }

    #[test]
    fn phases_progress_in_order() {
        let mut env = TriggerEnvelope::with_params(0.001, 0.001, 0.3);
        let dt = 1.0 / SR;
        env.process(dt, 10.0);
        assert_eq!(env.phase(), Phase::Attack);
        for _ in 0..60 {
            env.process(dt, 10.0);
        }
        assert_eq!(env.phase(), Phase::Decay);
        for _ in 0..60 {
            env.process(dt, 10.0);
        }
        assert_eq!(env.phase(), Phase::Idle);
        assert_eq!(env.output(), 0.0);
    }

    #[test]
    fn zero_decay_jumps_to_idle() {
        let mut env = TriggerEnvelope::with_params(0.0, 0.0, 0.0);
        let dt = 1.0 / SR;
        assert_eq!(env.process(dt, 5.0), 1.0);
        assert_eq!(env.process(dt, 5.0), 0.0);
        assert!(env.is_idle());
    }

    #[test]
    fn edges_while_running_are_ignored() {
        let mut env = TriggerEnvelope::with_params(0.01, 0.3, 0.0);
        let dt = 1.0 / SR;
        env.process(dt, 10.0);
        let mut before = 0.0;
        for _ in 0..600 {
            before = env.process(dt, 0.0);
        }
        assert_eq!(env.phase(), Phase::Decay);
        let after = env.process(dt, 10.0);
        assert_eq!(env.phase(), Phase::Decay);
        assert!((before - after).abs() < 0.01, "output jumped from {before} to {after}");

        // Once idle, the next edge starts a fresh cycle.
        for _ in 0..20000 {
            env.process(dt, 0.0);
        }
        assert!(env.is_idle());
        env.process(dt, 10.0);
        assert_eq!(env.phase(), Phase::Attack);
    }

    #[test]
    fn output_stays_in_unit_range() {
        for curve in [-0.99, -0.5, 0.0, 0.5, 0.99] {
            let mut env = TriggerEnvelope::with_params(0.005, 0.02, curve);
            let dt = 1.0 / SR;
            for i in 0..5000 {
                let gate = if i % 700 < 5 { 10.0 } else { 0.0 };
                let out = env.process(dt, gate);
                assert!((0.0..=1.0).contains(&out), "out of range {out} with curve {curve}");
            }
        }
    }

    #[test]
    fn knob_mapping_covers_six_decades() {
        assert!((knob_to_seconds(0.5, 0.0) - 1.0).abs() < 1e-5);
        assert!((knob_to_seconds(0.0, 0.0) - 0.001).abs() < 1e-6);
        assert!((knob_to_seconds(0.5, 1.0) - 1.5).abs() < 1e-5);
        assert_eq!(knob_to_seconds(0.0, -1.0), 0.001);
    }

    #[test]
    fn follower_tracks_and_releases() {
        let mut f = EnvelopeFollower::new();
        f.attack = 0.01;
        f.release = 0.1;
        let dt = 1.0 / SR;
        for _ in 0..4800 {
            f.process(dt, 10.0);
        }
        assert!(f.value() > 0.99, "follower should settle near 1, got {}", f.value());
        for _ in 0..48000 {
            f.process(dt, 0.0);
        }
        assert!(f.value() < 0.01, "follower should release, got {}", f.value());
    }

    #[test]
    fn follower_rectifies_negative_input() {
        let mut f = EnvelopeFollower::new();
        let dt = 1.0 / SR;
        for _ in 0..4800 {
            f.process(dt, -5.0);
        }
        assert!((f.value() - 0.5).abs() < 0.01, "got {}", f.value());
    }

    #[test]
    fn dual_envelope_takes_the_larger_branch() {
        let mut env = DualEnvelope::new();
        env.set_params(0.001, 0.5, 0.0);
        let dt = 1.0 / SR;
        // 5 V never arms the trigger branch; only the follower responds.
        for _ in 0..4800 {
            env.process(dt, 5.0);
        }
        assert!(env.trigger_env.is_idle());
        let out = env.process(dt, 5.0);
        assert!((out - 0.5).abs() < 0.02, "follower level expected, got {out}");

        // A hot trigger fires the full envelope.
        let mut peak = 0.0_f32;
        for _ in 0..200 {
            peak = peak.max(env.process(dt, 10.0));
        }
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn smooth_decay_envelope_runs_full_cycle() {
        let mut env = SmoothDecayEnvelope::new();
        env.decay = 0.1;
        env.shape = 0.4;
        let dt = 1.0 / SR;

        env.process(dt, 5.0);
        assert!(env.pulse());
        let mut peak = 0.0_f32;
        for _ in 0..100 {
            peak = peak.max(env.process(dt, 5.0));
        }
        assert_eq!(peak, 1.0);
        for _ in 0..5000 {
            env.process(dt, 0.0);
        }
        assert_eq!(env.phase(), Phase::Idle);
        assert!(!env.pulse(), "30 ms pulse should have ended");
    }

    #[test]
    fn smooth_decay_ignores_edges_until_idle() {
        let mut env = SmoothDecayEnvelope::new();
        env.decay = 0.5;
        let dt = 1.0 / SR;
        env.process(dt, 5.0);
        for _ in 0..2400 {
            env.process(dt, 0.0);
        }
        assert_eq!(env.phase(), Phase::Decay);
        let before = env.output;
        let after = env.process(dt, 5.0);
        assert_eq!(env.phase(), Phase::Decay);
        assert!((before - after).abs() < 0.01, "output jumped from {before} to {after}");
    }

    #[test]
    fn smooth_decay_needs_two_volts() {
        let mut env = SmoothDecayEnvelope::new();
        let dt = 1.0 / SR;
        env.process(dt, 1.5);
        assert_eq!(env.phase(), Phase::Idle);
        env.process(dt, 2.5);
        assert_eq!(env.phase(), Phase::Attack);
    }
}
