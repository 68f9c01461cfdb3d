//! Euclidean rhythm generation.
//!
//! Onsets are placed at `floor(i·length/fill)` and the pattern is then
//! rotated left by `shift`.

/// Longest pattern a sequencer track holds.
pub const MAX_STEPS: usize = 32;

/// Write a Euclidean pattern into `out`, using `out.len()` as the length.
///
/// `fill` is clamped to the length; negative shifts rotate right.
/// Allocation-free, so it can run on the audio thread.
pub fn fill_pattern(out: &mut [bool], fill: usize, shift: i32) {
    let length = out.len();
    out.fill(false);
    if length == 0 {
        return;
    }
    let fill = fill.min(length);
    if fill == 0 {
        return;
    }
    let offset = shift.rem_euclid(length as i32) as usize;
    for i in 0..fill {
        let onset = i * length / fill;
        // Left rotation moves onset n to n - offset.
        out[(onset + length - offset) % length] = true;
    }
}

/// Generate a Euclidean pattern of `length` steps.
pub fn generate(length: usize, fill: usize, shift: i32) -> Vec<bool> {
    let mut steps = vec![false; length];
    fill_pattern(&mut steps, fill, shift);
    steps
}

/// Traditional name for a well-known `E(fill, length)` rhythm.
pub fn traditional_name(fill: usize, length: usize) -> Option<&'static str> {
    const NAMES: &[(usize, usize, &str)] = &[
        (3, 8, "Tresillo"),
        (5, 8, "Cinquillo"),
        (7, 12, "Standard Bell"),
        (5, 16, "Bossa Nova"),
        (4, 9, "Aksak (Turkish)"),
        (3, 4, "Cumbia"),
        (5, 6, "Bendir"),
        (7, 8, "Tuareg"),
        (9, 16, "West African"),
        (11, 16, "Dense African"),
        (4, 12, "Fume Fume"),
        (5, 12, "South African"),
    ];
    NAMES
        .iter()
        .find(|(f, l, _)| *f == fill && *l == length)
        .map(|(_, _, name)| *name)
}

/// Fixed-capacity pattern that regenerates only when its inputs change.
#[derive(Debug, Clone)]
pub struct EuclideanPattern {
    steps: [bool; MAX_STEPS],
    length: usize,
    fill: usize,
    shift: i32,
}

impl Default for EuclideanPattern {
    fn default() -> Self {
        Self::new(16, 4, 0)
    }
}

impl EuclideanPattern {
    pub fn new(length: usize, fill: usize, shift: i32) -> Self {
        let mut p = EuclideanPattern {
            steps: [false; MAX_STEPS],
            length: 0,
            fill: 0,
            shift: 0,
        };
        p.regenerate(length, fill, shift);
        p
    }

    /// Update the inputs; returns true if the pattern was regenerated.
    /// Length is clamped to `1..=MAX_STEPS` and fill to the length.
    pub fn configure(&mut self, length: usize, fill: usize, shift: i32) -> bool {
        let length = length.clamp(1, MAX_STEPS);
        let fill = fill.min(length);
        if length == self.length && fill == self.fill && shift == self.shift {
            return false;
        }
        self.regenerate(length, fill, shift);
        true
    }

    fn regenerate(&mut self, length: usize, fill: usize, shift: i32) {
        self.length = length.clamp(1, MAX_STEPS);
        self.fill = fill.min(self.length);
        self.shift = shift;
        fill_pattern(&mut self.steps[..self.length], self.fill, shift);
        self.steps[self.length..].fill(false);
    }

    /// Step at `index`, wrapping around the pattern length.
    #[inline]
    pub fn step(&self, index: usize) -> bool {
        self.steps[index % self.length]
    }

    pub fn steps(&self) -> &[bool] {
        &self.steps[..self.length]
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn shift(&self) -> i32 {
        self.shift
    }

    pub fn name(&self) -> Option<&'static str> {
        traditional_name(self.fill, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_on_sixteen() {
        let expected = [
            true, false, false, false, true, false, false, false, true, false, false, false, true, false, false,
            false,
        ];
        assert_eq!(generate(16, 4, 0), expected);
    }

    #[test]
    fn onset_count_matches_fill() {
        for length in 1..=MAX_STEPS {
            for fill in 0..=length {
                for shift in [-7, 0, 3, 31] {
                    let p = generate(length, fill, shift);
                    let count = p.iter().filter(|&&s| s).count();
                    assert_eq!(count, fill, "E({fill},{length}) shift {shift}");
                }
            }
        }
    }

    #[test]
    fn full_rotation_is_identity() {
        for length in 1..=20usize {
            for fill in 0..=length {
                for shift in 0..length as i32 {
                    assert_eq!(
                        generate(length, fill, shift),
                        generate(length, fill, shift + length as i32),
                        "E({fill},{length}) shift {shift}"
                    );
                }
            }
        }
    }

    #[test]
    fn shift_rotates_left() {
        let base = generate(8, 3, 0);
        assert_eq!(base, [true, false, true, false, false, true, false, false]);
        let shifted = generate(8, 3, 1);
        assert_eq!(shifted, [false, true, false, false, true, false, false, true]);
        assert_eq!(generate(8, 3, -1), [false, true, false, true, false, false, true, false]);
    }

    #[test]
    fn degenerate_inputs() {
        assert!(generate(0, 3, 0).is_empty());
        assert!(generate(8, 0, 2).iter().all(|&s| !s));
        assert!(generate(5, 9, 0).iter().all(|&s| s), "fill > length clamps to all onsets");
    }

    #[test]
    fn pattern_only_regenerates_on_change() {
        let mut p = EuclideanPattern::new(8, 3, 0);
        assert!(!p.configure(8, 3, 0));
        assert!(p.configure(8, 5, 0));
        assert_eq!(p.steps(), generate(8, 5, 0).as_slice());
        assert_eq!(p.name(), Some("Cinquillo"));
        assert!(p.step(8), "index wraps to step 0");
    }

    #[test]
    fn pattern_clamps_length() {
        let mut p = EuclideanPattern::default();
        p.configure(100, 100, 0);
        assert_eq!(p.length(), MAX_STEPS);
        assert_eq!(p.fill(), MAX_STEPS);
        p.configure(0, 1, 0);
        assert_eq!(p.length(), 1);
        assert!(p.step(0));
    }

    #[test]
    fn names_known_rhythms() {
        assert_eq!(traditional_name(3, 8), Some("Tresillo"));
        assert_eq!(traditional_name(5, 16), Some("Bossa Nova"));
        assert_eq!(traditional_name(2, 7), None);
    }
}
