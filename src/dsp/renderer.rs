//! WAV renderer: renders a Euclidean drum pattern to a WAV byte buffer.

use serde::{Deserialize, Serialize};

use super::drum::{spread_mix, DrumSynth, Role};
use super::euclid::EuclideanPattern;
use super::mixer::soft_clip;

/// One voice's rhythm in a [`DrumPattern`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPattern {
    pub length: usize,
    pub fill: usize,
    #[serde(default)]
    pub shift: i32,
    #[serde(default = "full_velocity")]
    pub velocity: f32,
}

fn full_velocity() -> f32 {
    1.0
}

/// A sixteenth-note drum loop for offline rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrumPattern {
    /// Index into the style presets.
    pub style: usize,
    pub bpm: f32,
    /// Number of sixteenth-note steps to render.
    pub steps: usize,
    #[serde(default = "full_velocity")]
    pub spread: f32,
    /// Tracks in [`Role`] order.
    pub tracks: [TrackPattern; 4],
}

/// Frame count and step length for a pattern: the steps plus one beat of
/// tail so the last hits can ring out.
fn timing(pattern: &DrumPattern, sample_rate: f32) -> (usize, f64) {
    let bpm = pattern.bpm.clamp(20.0, 300.0);
    let step_len = sample_rate as f64 * 60.0 / bpm as f64 / 4.0;
    let total_frames = ((pattern.steps + 4) as f64 * step_len).round() as usize;
    (total_frames, step_len)
}

/// Drive the drum synth through the pattern, handing each soft-clipped
/// stereo frame to `emit`.
fn render_frames(pattern: &DrumPattern, sample_rate: u32, mut emit: impl FnMut(f32, f32)) {
    let sr = sample_rate.max(1) as f32;
    let (total_frames, step_len) = timing(pattern, sr);

    let mut synth = DrumSynth::new(sr);
    synth.apply_style(pattern.style);
    let tracks: Vec<EuclideanPattern> = pattern
        .tracks
        .iter()
        .map(|t| EuclideanPattern::new(t.length, t.fill, t.shift))
        .collect();

    let mut step = 0;
    let mut next_step_at = 0usize;
    for frame in 0..total_frames {
        if step < pattern.steps && frame == next_step_at {
            for ((role, track), t) in Role::ALL.iter().zip(&tracks).zip(&pattern.tracks) {
                if track.step(step) {
                    synth.trigger(*role, t.velocity.clamp(0.0, 1.0));
                }
            }
            step += 1;
            next_step_at = (step as f64 * step_len).round() as usize;
        }
        let (left, right) = spread_mix(&synth.process_separate(), pattern.spread);
        emit(soft_clip(left), soft_clip(right));
    }

    log::debug!(
        "rendered {} steps at {} BPM: {total_frames} frames at {sample_rate} Hz",
        pattern.steps,
        pattern.bpm.clamp(20.0, 300.0)
    );
}

/// Render a pattern to interleaved stereo i16 PCM.
pub fn render_pcm_i16(pattern: &DrumPattern, sample_rate: u32) -> Vec<i16> {
    let (frames, _) = timing(pattern, sample_rate.max(1) as f32);
    let mut pcm = Vec::with_capacity(frames * CHANNELS as usize);
    render_frames(pattern, sample_rate, |left, right| {
        pcm.push(to_i16(left));
        pcm.push(to_i16(right));
    });
    pcm
}

/// Render a pattern to a WAV file as bytes (16-bit stereo PCM).
///
/// Frames are written straight after a placeholder header, which is filled
/// in once the data length is known.
pub fn render_wav(pattern: &DrumPattern, sample_rate: u32) -> Vec<u8> {
    let (frames, _) = timing(pattern, sample_rate.max(1) as f32);
    let mut wav = Vec::with_capacity(HEADER_LEN + frames * BLOCK_ALIGN as usize);
    wav.resize(HEADER_LEN, 0);
    render_frames(pattern, sample_rate, |left, right| {
        wav.extend_from_slice(&to_i16(left).to_le_bytes());
        wav.extend_from_slice(&to_i16(right).to_le_bytes());
    });
    let data_len = (wav.len() - HEADER_LEN) as u32;
    wav[..HEADER_LEN].copy_from_slice(&wav_header(sample_rate, data_len));
    wav
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

const HEADER_LEN: usize = 44;
const CHANNELS: u16 = 2;
const BLOCK_ALIGN: u16 = CHANNELS * 2;

/// Canonical 44-byte header for 16-bit stereo PCM with `data_len` bytes of
/// samples.
fn wav_header(sample_rate: u32, data_len: u32) -> [u8; HEADER_LEN] {
    let fields: [(&[u8], usize); 12] = [
        (b"RIFF", 0),
        (&(data_len + 36).to_le_bytes(), 4),
        (b"WAVEfmt ", 8),
        (&16u32.to_le_bytes(), 16),
        (&1u16.to_le_bytes(), 20),
        (&CHANNELS.to_le_bytes(), 22),
        (&sample_rate.to_le_bytes(), 24),
        (&(sample_rate * BLOCK_ALIGN as u32).to_le_bytes(), 28),
        (&BLOCK_ALIGN.to_le_bytes(), 32),
        (&16u16.to_le_bytes(), 34),
        (b"data", 36),
        (&data_len.to_le_bytes(), 40),
    ];
    let mut header = [0u8; HEADER_LEN];
    for (bytes, offset) in fields {
        header[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
    header
}
