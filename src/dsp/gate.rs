//! Gate utilities: Schmitt trigger edge detection, fixed-length trigger
//! pulses and a slew limiter for gate smoothing.

/// Rising-edge detector with hysteresis.
///
/// The input must reach `high` to register as on and fall to `low` before a
/// new edge can fire.
#[derive(Debug, Clone)]
pub struct SchmittTrigger {
    pub low: f32,
    pub high: f32,
    state: bool,
}

impl Default for SchmittTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl SchmittTrigger {
    /// Trigger with the common 0.1 V / 1 V thresholds.
    pub fn new() -> Self {
        Self::with_thresholds(0.1, 1.0)
    }

    pub fn with_thresholds(low: f32, high: f32) -> Self {
        SchmittTrigger {
            low,
            high: high.max(low),
            state: false,
        }
    }

    /// Feed one sample; returns true on the rising edge only.
    #[inline]
    pub fn process(&mut self, input: f32) -> bool {
        if self.state {
            if input <= self.low {
                self.state = false;
            }
            false
        } else if input >= self.high {
            self.state = true;
            true
        } else {
            false
        }
    }

    /// True while the input is considered high.
    pub fn is_high(&self) -> bool {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = false;
    }
}

/// Emits a high level for a fixed duration after each trigger.
#[derive(Debug, Clone, Default)]
pub struct PulseGenerator {
    remaining: f32,
}

impl PulseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or extend) a pulse lasting `duration` seconds.
    pub fn trigger(&mut self, duration: f32) {
        if duration > self.remaining {
            self.remaining = duration;
        }
    }

    /// Advance by `dt` seconds; returns whether the pulse is high.
    #[inline]
    pub fn process(&mut self, dt: f32) -> bool {
        if self.remaining > 0.0 {
            self.remaining -= dt;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.remaining = 0.0;
    }
}

/// Slew limiter that closes a fraction `rate·dt` of the remaining distance
/// each sample, with independent rise and fall rates (1/seconds).
#[derive(Debug, Clone)]
pub struct SlewLimiter {
    pub rise: f32,
    pub fall: f32,
    out: f32,
}

impl Default for SlewLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl SlewLimiter {
    /// Unlimited in both directions.
    pub fn new() -> Self {
        SlewLimiter {
            rise: f32::INFINITY,
            fall: f32::INFINITY,
            out: 0.0,
        }
    }

    /// Set rates from time constants in seconds. A time of zero means an
    /// instant jump.
    pub fn set_times(&mut self, rise_time: f32, fall_time: f32) {
        self.rise = if rise_time > 0.0 { 1.0 / rise_time } else { f32::INFINITY };
        self.fall = if fall_time > 0.0 { 1.0 / fall_time } else { f32::INFINITY };
    }

    #[inline]
    pub fn process(&mut self, dt: f32, target: f32) -> f32 {
        let rate = if target > self.out { self.rise } else { self.fall };
        if rate.is_infinite() {
            self.out = target;
        } else {
            self.out += (target - self.out) * (rate * dt).min(1.0);
        }
        self.out
    }

    pub fn value(&self) -> f32 {
        self.out
    }

    pub fn reset(&mut self) {
        self.out = 0.0;
    }
}
