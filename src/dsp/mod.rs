//! DSP building blocks, all allocation-free in their per-sample paths.
//!
//! Every block is driven once per sample by a module wrapper; buffers are
//! sized at construction and only ever reused afterwards.

pub mod bandpass;
pub mod curve;
pub mod drum;
pub mod envelope;
pub mod euclid;
pub mod filter;
pub mod gate;
pub mod looper;
pub mod lowpass;
pub mod mixer;
pub mod panner;
pub mod renderer;
pub mod tone;

/// Per-call timing handed to every module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessArgs {
    pub sample_rate: f32,
    /// `1 / sample_rate`.
    pub sample_time: f32,
}

impl ProcessArgs {
    pub fn new(sample_rate: f32) -> Self {
        let sample_rate = sample_rate.max(1.0);
        ProcessArgs {
            sample_rate,
            sample_time: 1.0 / sample_rate,
        }
    }
}

impl Default for ProcessArgs {
    fn default() -> Self {
        Self::new(48000.0)
    }
}

/// Linear map of `x` from `[x_min, x_max]` to `[y_min, y_max]` (no clamping).
#[inline]
pub fn rescale(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    y_min + (x - x_min) / (x_max - x_min) * (y_max - y_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_args_sample_time() {
        let args = ProcessArgs::new(48000.0);
        assert!((args.sample_time * 48000.0 - 1.0).abs() < 1e-6);
        assert_eq!(ProcessArgs::new(0.0).sample_rate, 1.0);
    }

    #[test]
    fn rescale_maps_endpoints() {
        assert_eq!(rescale(-1.0, -1.0, 0.0, 20.0, 22000.0), 20.0);
        assert_eq!(rescale(0.0, -1.0, 0.0, 20.0, 22000.0), 22000.0);
        assert_eq!(rescale(0.25, 0.0, 1.0, 0.0, 4.0), 1.0);
    }
}
