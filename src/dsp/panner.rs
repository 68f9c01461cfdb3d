//! VBAP-style gain computation over the eight corners of a cube.

use serde::{Deserialize, Serialize};

/// A point in the unit cube `[-1, 1]³`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Position { x, y, z }
    }

    /// Clamp every axis into `[-1, 1]`.
    pub fn clamped(self) -> Self {
        Position {
            x: self.x.clamp(-1.0, 1.0),
            y: self.y.clamp(-1.0, 1.0),
            z: self.z.clamp(-1.0, 1.0),
        }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

pub const SPEAKER_COUNT: usize = 8;

/// Speaker layout: x is left/right, y is lower/upper, z is back/front.
/// Upper ring first (front-left, front-right, back-left, back-right), then
/// the lower ring in the same order.
pub const SPEAKERS: [Position; SPEAKER_COUNT] = [
    Position::new(-1.0, -1.0, 1.0),
    Position::new(1.0, -1.0, 1.0),
    Position::new(-1.0, -1.0, -1.0),
    Position::new(1.0, -1.0, -1.0),
    Position::new(-1.0, 1.0, 1.0),
    Position::new(1.0, 1.0, 1.0),
    Position::new(-1.0, 1.0, -1.0),
    Position::new(1.0, 1.0, -1.0),
];

const MIN_DISTANCE: f32 = 0.001;
const EDGE: f32 = 0.8;
const EDGE_WIDTH: f32 = 0.2;

/// Attenuation for a speaker on the far side of one axis when the source is
/// pushed against that axis' extreme.
#[inline]
fn edge_fade(source: f32, speaker: f32) -> f32 {
    if source <= -EDGE && speaker > 0.0 {
        ((source + 1.0) / EDGE_WIDTH).max(0.0)
    } else if source >= EDGE && speaker < 0.0 {
        ((1.0 - source) / EDGE_WIDTH).max(0.0)
    } else {
        1.0
    }
}

/// Per-speaker gains for a source position.
///
/// Raw gain is `1 / (1 + d + 2d²)` of the distance to each speaker (floored
/// at 0.001), faded out on the far side of any axis within 0.2 of an
/// extreme, then power-normalized so `Σ g² = 1`. Returns all zeros only in
/// the degenerate case where every gain faded out.
pub fn vbap_gains(source: Position) -> [f32; SPEAKER_COUNT] {
    let source = source.clamped();
    let mut gains = [0.0_f32; SPEAKER_COUNT];

    for (gain, speaker) in gains.iter_mut().zip(SPEAKERS.iter()) {
        let d = source.distance(speaker).max(MIN_DISTANCE);
        let mut g = 1.0 / (1.0 + d + 2.0 * d * d);
        g *= edge_fade(source.x, speaker.x);
        g *= edge_fade(source.y, speaker.y);
        g *= edge_fade(source.z, speaker.z);
        *gain = g;
    }

    let power: f32 = gains.iter().map(|g| g * g).sum();
    if power > 0.0 {
        let norm = 1.0 / power.sqrt();
        for g in &mut gains {
            *g *= norm;
        }
    }
    gains
}
