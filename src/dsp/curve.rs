//! Curve shaping primitives shared by every envelope and fill curve.

/// Rational curve on the unit interval.
///
/// `k = 0` is linear, negative `k` bows the curve upward (fast start),
/// positive `k` bows it downward (slow start). The endpoints are fixed:
/// `apply_curve(0, k) == 0` and `apply_curve(1, k) == 1` for every `k` in
/// `(-1, 1)`. Near the singular denominator the input is returned unchanged.
#[inline]
pub fn apply_curve(x: f32, k: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    if k == 0.0 {
        return x;
    }
    let den = k - 2.0 * k * x + 1.0;
    if den.abs() < 1e-6 {
        return x;
    }
    (x - k * x) / den
}

/// Hermite smoothstep `t²(3 − 2t)` on the unit interval.
#[inline]
pub fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Decay shape whose curvature morphs across the decay.
///
/// The front of the decay uses `k = -0.9 + 0.5·shape` and the tail uses
/// `k = -1 + 1.6·shape^0.3`; the two are blended with [`smoothstep`].
/// `shape` is clamped to `[0, 0.99]`. Returns the remaining level, 1 at
/// `t = 0` and 0 at `t >= 1`.
pub fn smooth_decay(t: f32, shape: f32) -> f32 {
    if t >= 1.0 {
        return 0.0;
    }
    let t = t.max(0.0);
    let shape = shape.clamp(0.0, 0.99);

    let front_k = -0.9 + shape * 0.5;
    let back_k = -1.0 + 1.6 * shape.powf(0.3);
    let blend = smoothstep(t);
    let k = front_k * (1.0 - blend) + back_k * blend;

    let den = k - 2.0 * k * t + 1.0;
    if den.abs() < 1e-10 {
        return 1.0 - t;
    }
    let curved = (t - k * t) / den;
    (1.0 - curved).clamp(0.0, 1.0)
}
