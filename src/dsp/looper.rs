//! Loop cell: fixed-capacity recorder/player with a loop-point crossfade
//! and click-free start/stop fades.

use serde::{Deserialize, Serialize};

/// Length of the loop-point crossfade and of the start/stop fades
/// (2 ms at 48 kHz).
pub const FADE_SAMPLES: usize = 96;

/// Default capacity: ten seconds at 48 kHz.
pub const DEFAULT_CAPACITY: usize = 48000 * 10;

/// Cell lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Empty,
    HasContent,
    Playing,
    Recording,
    /// Waiting for a quantize boundary to start playing.
    Queued,
    /// Still playing until the next quantize boundary.
    StopQueued,
    /// Waiting for a quantize boundary to start recording.
    RecordQueued,
}

/// A single loop slot.
///
/// The buffer is allocated once at construction; recording zero-fills and
/// reuses it.
#[derive(Debug, Clone)]
pub struct LoopCell {
    buffer: Vec<f32>,
    recorded_length: usize,
    record_position: usize,
    state: CellState,
    play_position: usize,
    /// Start/stop fade progress in samples, `0..=FADE_SAMPLES`.
    fade_pos: usize,
    fading_in: bool,
    fading_out: bool,
    /// Loop length in clock ticks, measured while recording.
    pub loop_clocks: u32,
}

impl LoopCell {
    pub fn new(capacity: usize) -> Self {
        LoopCell {
            buffer: vec![0.0; capacity.max(1)],
            recorded_length: 0,
            record_position: 0,
            state: CellState::Empty,
            play_position: 0,
            fade_pos: 0,
            fading_in: false,
            fading_out: false,
            loop_clocks: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn state(&self) -> CellState {
        self.state
    }

    pub fn recorded_length(&self) -> usize {
        self.recorded_length
    }

    pub fn play_position(&self) -> usize {
        self.play_position
    }

    /// Start/stop fade gain in `[0, 1]`.
    pub fn fade_gain(&self) -> f32 {
        self.fade_pos as f32 / FADE_SAMPLES as f32
    }

    /// Recorded audio.
    pub fn recorded(&self) -> &[f32] {
        &self.buffer[..self.recorded_length]
    }

    pub fn has_content(&self) -> bool {
        self.recorded_length > 0
    }

    /// Whether the cell currently contributes to the output, including the
    /// tail of a stop fade.
    pub fn is_audible(&self) -> bool {
        self.recorded_length > 0
            && (matches!(self.state, CellState::Playing | CellState::StopQueued) || self.fading_out)
    }

    /// Zero the buffer and start recording from the top.
    pub fn start_recording(&mut self) {
        self.buffer.fill(0.0);
        self.recorded_length = 0;
        self.record_position = 0;
        self.play_position = 0;
        self.fade_pos = 0;
        self.fading_in = false;
        self.fading_out = false;
        self.state = CellState::Recording;
    }

    /// Append one sample. Returns false once the buffer is full; the sample
    /// is dropped in that case.
    #[inline]
    pub fn record(&mut self, sample: f32) -> bool {
        if self.state != CellState::Recording {
            return false;
        }
        match self.buffer.get_mut(self.record_position) {
            Some(slot) => {
                *slot = sample;
                self.record_position += 1;
                true
            }
            None => false,
        }
    }

    /// Close the take. An empty take leaves the cell empty.
    pub fn stop_recording(&mut self, loop_clocks: u32) {
        self.recorded_length = self.record_position;
        self.loop_clocks = loop_clocks.max(1);
        self.state = if self.recorded_length > 0 {
            CellState::HasContent
        } else {
            CellState::Empty
        };
    }

    /// Start playback from the top with a fade-in. A restart during a stop
    /// fade ramps up from the current fade gain.
    pub fn start_playing(&mut self) {
        if self.recorded_length == 0 {
            return;
        }
        if !self.fading_out {
            self.fade_pos = 0;
        }
        self.state = CellState::Playing;
        self.play_position = 0;
        self.fading_in = true;
        self.fading_out = false;
    }

    /// Stop playback. The cell reports [`CellState::HasContent`] at once but
    /// keeps sounding until its fade-out completes.
    pub fn stop_playing(&mut self) {
        let was_audible = self.is_audible();
        self.state = if self.recorded_length > 0 {
            CellState::HasContent
        } else {
            CellState::Empty
        };
        self.fading_in = false;
        if was_audible && self.fade_pos > 0 {
            self.fading_out = true;
        } else {
            self.fading_out = false;
            self.fade_pos = 0;
            self.play_position = 0;
        }
    }

    /// Change the reported state without touching playback; used for the
    /// queued states and for cancelling them.
    pub fn set_state(&mut self, state: CellState) {
        self.state = state;
    }

    /// Jump back to the loop start (transport reset).
    pub fn rewind(&mut self) {
        self.play_position = 0;
    }

    /// Erase the recording and return to [`CellState::Empty`].
    pub fn clear(&mut self) {
        self.recorded_length = 0;
        self.record_position = 0;
        self.play_position = 0;
        self.fade_pos = 0;
        self.fading_in = false;
        self.fading_out = false;
        self.loop_clocks = 0;
        self.state = CellState::Empty;
    }

    /// Replace the recording with `samples` (truncated to capacity).
    pub fn load(&mut self, samples: &[f32], loop_clocks: u32) {
        self.clear();
        let n = samples.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&samples[..n]);
        self.buffer[n..].fill(0.0);
        self.recorded_length = n;
        self.record_position = n;
        self.loop_clocks = loop_clocks;
        if n > 0 {
            self.state = CellState::HasContent;
        }
    }

    /// Loop-point crossfade length for the current recording.
    fn crossfade_len(&self) -> usize {
        FADE_SAMPLES.min(self.recorded_length / 2)
    }

    /// Next playback sample (0 when not audible).
    ///
    /// Within the last `fade` samples of the loop the tail is crossfaded with
    /// the head, and the wrap lands on `fade` so the already-blended head is
    /// not replayed.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if !self.is_audible() {
            return 0.0;
        }

        let len = self.recorded_length;
        let fade = self.crossfade_len();
        let pos = self.play_position.min(len - 1);
        let mut sample = self.buffer[pos];

        if fade > 0 && pos >= len - fade {
            let i = pos - (len - fade);
            let t = (i + 1) as f32 / fade as f32;
            sample = (1.0 - t) * sample + t * self.buffer[i];
        }

        self.play_position = pos + 1;
        if self.play_position >= len {
            self.play_position = fade;
        }

        let out = sample * self.fade_gain();
        self.advance_fade();
        out
    }

    fn advance_fade(&mut self) {
        if self.fading_in {
            self.fade_pos += 1;
            if self.fade_pos >= FADE_SAMPLES {
                self.fade_pos = FADE_SAMPLES;
                self.fading_in = false;
            }
        } else if self.fading_out {
            self.fade_pos = self.fade_pos.saturating_sub(1);
            if self.fade_pos == 0 {
                self.fading_out = false;
                self.play_position = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn recorded_cell(samples: &[f32]) -> LoopCell {
        let mut cell = LoopCell::new(samples.len() + 100);
        cell.start_recording();
        for &s in samples {
            assert!(cell.record(s));
        }
        cell.stop_recording(4);
        cell
    }

    #[test]
    fn record_then_play() {
        let cell = recorded_cell(&[0.5; 400]);
        assert_eq!(cell.state(), CellState::HasContent);
        assert_eq!(cell.recorded_length(), 400);
        assert_eq!(cell.loop_clocks, 4);
    }

    #[test]
    fn empty_take_stays_empty() {
        let mut cell = LoopCell::new(64);
        cell.start_recording();
        cell.stop_recording(0);
        assert_eq!(cell.state(), CellState::Empty);
        cell.start_playing();
        assert_eq!(cell.state(), CellState::Empty);
        assert_eq!(cell.next_sample(), 0.0);
    }

    #[test]
    fn recording_stops_accepting_when_full() {
        let mut cell = LoopCell::new(10);
        cell.start_recording();
        for _ in 0..10 {
            assert!(cell.record(1.0));
        }
        assert!(!cell.record(1.0));
        cell.stop_recording(1);
        assert_eq!(cell.recorded_length(), 10);
        assert_eq!(cell.capacity(), 10);
    }

    #[test]
    fn rerecording_reuses_zeroed_buffer() {
        let mut cell = recorded_cell(&[1.0; 300]);
        let capacity = cell.capacity();
        cell.start_recording();
        for _ in 0..50 {
            cell.record(0.25);
        }
        cell.stop_recording(1);
        assert_eq!(cell.capacity(), capacity);
        assert_eq!(cell.recorded(), &[0.25; 50][..]);
    }

    #[test]
    fn fade_in_ramps_over_fade_window() {
        let mut cell = recorded_cell(&[1.0; 1000]);
        cell.start_playing();
        assert_eq!(cell.next_sample(), 0.0);
        for i in 1..FADE_SAMPLES {
            let s = cell.next_sample();
            let expected = i as f32 / FADE_SAMPLES as f32;
            assert!((s - expected).abs() < 1e-4, "sample {i}: {s} vs {expected}");
        }
        assert!((cell.next_sample() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stop_fades_out_then_falls_silent() {
        let mut cell = recorded_cell(&[1.0; 1000]);
        cell.start_playing();
        for _ in 0..200 {
            cell.next_sample();
        }
        cell.stop_playing();
        assert_eq!(cell.state(), CellState::HasContent);
        assert!(cell.is_audible(), "fade-out tail still sounds");
        let mut prev = 1.0;
        for _ in 0..FADE_SAMPLES {
            let s = cell.next_sample();
            assert!(s <= prev + 1e-6);
            prev = s;
        }
        assert!(!cell.is_audible());
        assert_eq!(cell.next_sample(), 0.0);
        assert_eq!(cell.play_position(), 0);
    }

    #[test]
    fn restart_during_fade_out_keeps_gain() {
        let mut cell = recorded_cell(&[1.0; 400]);
        cell.start_playing();
        for _ in 0..200 {
            cell.next_sample();
        }
        cell.stop_playing();
        let mut last = 1.0;
        for _ in 0..40 {
            last = cell.next_sample();
        }
        assert!(last > 0.5 && last < 1.0, "mid fade-out, got {last}");

        cell.start_playing();
        assert_eq!(cell.state(), CellState::Playing);
        let next = cell.next_sample();
        assert!((next - last).abs() <= 2.0 / FADE_SAMPLES as f32, "gain jumped from {last} to {next}");
        for _ in 0..FADE_SAMPLES {
            cell.next_sample();
        }
        assert_eq!(cell.fade_gain(), 1.0);
    }

    #[test]
    fn wrap_skips_crossfaded_head() {
        let samples: Vec<f32> = (0..300).map(|i| i as f32).collect();
        let mut cell = recorded_cell(&samples);
        cell.start_playing();
        for _ in 0..300 {
            cell.next_sample();
        }
        assert_eq!(cell.play_position(), FADE_SAMPLES);
    }

    #[test]
    fn crossfade_ends_on_head_sample() {
        let samples: Vec<f32> = (0..300).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut cell = recorded_cell(&samples);
        cell.start_playing();
        let mut out = Vec::new();
        for _ in 0..300 {
            out.push(cell.next_sample());
        }
        // Last sample of the loop is entirely the head sample at fade - 1.
        assert!((out[299] - samples[FADE_SAMPLES - 1]).abs() < 1e-6);
        // And playback continues from the sample after it.
        assert!((cell.next_sample() - samples[FADE_SAMPLES]).abs() < 1e-6);
    }

    #[test]
    fn loop_point_is_click_free() {
        let sr = 48000.0;
        let samples: Vec<f32> = (0..1000).map(|i| (2.0 * PI * 220.0 * i as f32 / sr).sin()).collect();
        let mut cell = recorded_cell(&samples);
        cell.start_playing();

        let mut prev = cell.next_sample();
        let mut max_jump = 0.0_f32;
        for _ in 0..5000 {
            let s = cell.next_sample();
            max_jump = max_jump.max((s - prev).abs());
            prev = s;
        }
        let slope = 2.0 * PI * 220.0 / sr;
        assert!(max_jump < 0.1, "max step {max_jump}");
        assert!(max_jump < slope + 2.0 / FADE_SAMPLES as f32 + 1e-3);
    }

    #[test]
    fn short_loops_shrink_the_crossfade() {
        let mut cell = recorded_cell(&[0.0, 1.0, 0.0, 1.0]);
        cell.start_playing();
        for _ in 0..100 {
            let s = cell.next_sample();
            assert!(s.is_finite());
        }
        assert!(cell.play_position() < 4);

        let mut single = recorded_cell(&[0.7]);
        single.start_playing();
        for _ in 0..200 {
            single.next_sample();
        }
        assert!((single.next_sample() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn load_and_clear() {
        let mut cell = LoopCell::new(8);
        cell.load(&[1.0; 20], 2);
        assert_eq!(cell.recorded_length(), 8);
        assert_eq!(cell.state(), CellState::HasContent);
        cell.clear();
        assert_eq!(cell.state(), CellState::Empty);
        assert!(!cell.has_content());
    }
}
