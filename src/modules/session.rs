//! Clip-launcher grid of [`LoopCell`]s.
//!
//! Each row records from its own input and plays at most one cell at a time.
//! Columns are scenes. Launches and stops can be quantized to a number of
//! clock ticks; the grid only counts ticks, it never measures tempo.

use crate::dsp::gate::SchmittTrigger;
use crate::dsp::looper::{CellState, LoopCell, DEFAULT_CAPACITY};
use crate::dsp::ProcessArgs;
use crate::error::{CoreError, StateError};
use crate::params::{DisplayFormatter, ParamSpec};
use crate::state::{ModuleState, Persist};

pub const DEFAULT_ROWS: usize = 8;
pub const DEFAULT_COLS: usize = 8;

/// Quantize choices in clock ticks; 0 launches immediately.
pub const QUANTIZE_STEPS: [u32; 6] = [0, 1, 8, 16, 32, 64];
const QUANTIZE_LABELS: [&str; 6] = ["Free", "1", "8", "16", "32", "64"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowParams {
    /// Send A amount, 0..1.
    pub send_a: f32,
    /// Send B amount, 0..1.
    pub send_b: f32,
    /// Pan, -1..1.
    pub pan: f32,
    /// Level, 0..1.
    pub level: f32,
}

impl Default for RowParams {
    fn default() -> Self {
        RowParams {
            send_a: 0.0,
            send_b: 0.0,
            pan: 0.0,
            level: 1.0,
        }
    }
}

impl RowParams {
    /// Linear pan law: the far side is attenuated, the near side stays at 1.
    pub fn pan_gains(&self) -> (f32, f32) {
        let pan = self.pan.clamp(-1.0, 1.0);
        let left = if pan <= 0.0 { 1.0 } else { 1.0 - pan };
        let right = if pan >= 0.0 { 1.0 } else { 1.0 + pan };
        (left, right)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    /// Index into [`QUANTIZE_STEPS`].
    pub quantize: usize,
    pub rows: Vec<RowParams>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionInputs<'a> {
    pub clock: Option<f32>,
    pub reset: Option<f32>,
    /// Per-row record inputs. Missing rows read 0 V.
    pub rows: &'a [f32],
    pub return_a: (f32, f32),
    pub return_b: (f32, f32),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionOutputs {
    pub send_a: (f32, f32),
    pub send_b: (f32, f32),
    pub mix_left: f32,
    pub mix_right: f32,
}

#[derive(Debug, Clone)]
pub struct SessionGrid {
    pub params: SessionParams,
    rows: usize,
    cols: usize,
    cells: Vec<LoopCell>,
    row_outputs: Vec<f32>,
    clock: SchmittTrigger,
    reset: SchmittTrigger,
    clock_count: u32,
    recording: Option<(usize, usize)>,
    record_start: u32,
}

const PARAMS: [ParamSpec; 5] = [
    ParamSpec::new("Quantize", 0.0, 5.0, 0.0, DisplayFormatter::SteppedEnum { labels: &QUANTIZE_LABELS }),
    ParamSpec::new("Send A", 0.0, 1.0, 0.0, DisplayFormatter::Percentage),
    ParamSpec::new("Send B", 0.0, 1.0, 0.0, DisplayFormatter::Percentage),
    ParamSpec::plain("Pan", -1.0, 1.0, 0.0, ""),
    ParamSpec::new("Level", 0.0, 1.0, 1.0, DisplayFormatter::Percentage),
];

impl Default for SessionGrid {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS, DEFAULT_CAPACITY)
    }
}

impl SessionGrid {
    /// Every cell buffer is allocated here, `capacity` samples each.
    pub fn new(rows: usize, cols: usize, capacity: usize) -> Self {
        let rows = rows.max(1);
        let cols = cols.max(1);
        SessionGrid {
            params: SessionParams {
                quantize: 0,
                rows: vec![RowParams::default(); rows],
            },
            rows,
            cols,
            cells: (0..rows * cols).map(|_| LoopCell::new(capacity)).collect(),
            row_outputs: vec![0.0; rows],
            clock: SchmittTrigger::with_thresholds(0.1, 1.0),
            reset: SchmittTrigger::with_thresholds(0.1, 1.0),
            clock_count: 0,
            recording: None,
            record_start: 0,
        }
    }

    /// Quantize, then the per-row knobs (send A, send B, pan, level).
    pub fn params() -> &'static [ParamSpec] {
        &PARAMS
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&LoopCell> {
        if row < self.rows && col < self.cols {
            self.cells.get(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn clock_count(&self) -> u32 {
        self.clock_count
    }

    /// Cell being recorded, if any.
    pub fn recording(&self) -> Option<(usize, usize)> {
        self.recording
    }

    /// Per-row outputs from the last `process` call, after level.
    pub fn row_outputs(&self) -> &[f32] {
        &self.row_outputs
    }

    fn quantize_ticks(&self) -> u32 {
        QUANTIZE_STEPS[self.params.quantize.min(QUANTIZE_STEPS.len() - 1)]
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then_some(row * self.cols + col)
    }

    /// Short press on a cell. Out-of-range coordinates are ignored.
    pub fn click(&mut self, row: usize, col: usize) {
        let Some(idx) = self.index(row, col) else {
            return;
        };
        let quantized = self.quantize_ticks() > 0;
        let before = self.cells[idx].state();
        match before {
            CellState::Empty if quantized => self.cells[idx].set_state(CellState::RecordQueued),
            CellState::Empty => self.start_recording(row, col),
            CellState::Recording => self.stop_recording(),
            CellState::Playing if quantized => self.cells[idx].set_state(CellState::StopQueued),
            CellState::Playing => self.cells[idx].stop_playing(),
            CellState::HasContent | CellState::Queued if quantized => {
                self.cells[idx].set_state(CellState::Queued)
            }
            CellState::HasContent | CellState::Queued => self.start_playing(row, col),
            CellState::RecordQueued => self.cells[idx].set_state(CellState::Empty),
            CellState::StopQueued => self.cells[idx].set_state(CellState::Playing),
        }
        log::debug!(
            "session grid: cell ({row}, {col}) {before:?} -> {:?}",
            self.cells[idx].state()
        );
    }

    /// Long press on a cell: erase it.
    pub fn hold(&mut self, row: usize, col: usize) {
        let Some(idx) = self.index(row, col) else {
            return;
        };
        if self.recording == Some((row, col)) {
            self.recording = None;
        }
        self.cells[idx].clear();
        log::debug!("session grid: cell ({row}, {col}) cleared");
    }

    fn start_recording(&mut self, row: usize, col: usize) {
        if self.recording.is_some() {
            self.stop_recording();
        }
        let idx = row * self.cols + col;
        self.cells[idx].start_recording();
        self.recording = Some((row, col));
        self.record_start = self.clock_count;
    }

    fn stop_recording(&mut self) {
        let Some((row, col)) = self.recording.take() else {
            return;
        };
        let loop_clocks = self.clock_count.saturating_sub(self.record_start);
        self.cells[row * self.cols + col].stop_recording(loop_clocks);
    }

    /// Start a cell from the top, stopping whatever else plays in its row.
    fn start_playing(&mut self, row: usize, col: usize) {
        let start = row * self.cols;
        for (c, cell) in self.cells[start..start + self.cols].iter_mut().enumerate() {
            if c != col
                && matches!(
                    cell.state(),
                    CellState::Playing | CellState::Queued | CellState::StopQueued
                )
            {
                cell.stop_playing();
            }
        }
        self.cells[start + col].start_playing();
    }

    /// Stop every playing cell and cancel pending launches.
    pub fn stop_all(&mut self) {
        for cell in &mut self.cells {
            if matches!(
                cell.state(),
                CellState::Playing | CellState::Queued | CellState::StopQueued
            ) {
                cell.stop_playing();
            }
        }
        log::debug!("session grid: stop all");
    }

    /// Launch column `col` as a scene. Rows with content there switch to it;
    /// rows that are empty there stop.
    pub fn trigger_scene(&mut self, col: usize) {
        if col >= self.cols {
            return;
        }
        let quantized = self.quantize_ticks() > 0;
        for row in 0..self.rows {
            let start = row * self.cols;
            match self.cells[start + col].state() {
                CellState::HasContent if quantized => {
                    for (c, cell) in self.cells[start..start + self.cols].iter_mut().enumerate() {
                        if c != col && cell.state() == CellState::Queued {
                            cell.set_state(CellState::HasContent);
                        }
                    }
                    self.cells[start + col].set_state(CellState::Queued);
                }
                CellState::HasContent => self.start_playing(row, col),
                CellState::Empty => {
                    for cell in &mut self.cells[start..start + self.cols] {
                        match cell.state() {
                            CellState::Playing if quantized => cell.set_state(CellState::StopQueued),
                            CellState::Playing => cell.stop_playing(),
                            CellState::Queued => cell.set_state(CellState::HasContent),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        log::debug!("session grid: scene {col}");
    }

    /// Apply pending launches, stops and record starts.
    fn fire_queued(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.cols {
                match self.cells[row * self.cols + col].state() {
                    CellState::Queued => self.start_playing(row, col),
                    CellState::StopQueued => self.cells[row * self.cols + col].stop_playing(),
                    CellState::RecordQueued => self.start_recording(row, col),
                    _ => {}
                }
            }
        }
    }

    pub fn process(&mut self, _args: &ProcessArgs, inputs: &SessionInputs) -> SessionOutputs {
        if self.reset.process(inputs.reset.unwrap_or(0.0)) {
            self.clock_count = 0;
            for cell in &mut self.cells {
                if cell.state() == CellState::Playing {
                    cell.rewind();
                }
            }
        }

        if self.clock.process(inputs.clock.unwrap_or(0.0)) {
            self.clock_count = self.clock_count.wrapping_add(1);
            let ticks = self.quantize_ticks();
            if ticks > 0 && self.clock_count % ticks == 0 {
                self.fire_queued();
            }
        }

        if let Some((row, col)) = self.recording {
            let sample = inputs.rows.get(row).copied().unwrap_or(0.0);
            if !self.cells[row * self.cols + col].record(sample) {
                log::debug!("session grid: cell ({row}, {col}) buffer full");
                self.stop_recording();
            }
        }

        let mut out = SessionOutputs {
            mix_left: inputs.return_a.0 + inputs.return_b.0,
            mix_right: inputs.return_a.1 + inputs.return_b.1,
            ..Default::default()
        };
        for row in 0..self.rows {
            let start = row * self.cols;
            let signal: f32 = self.cells[start..start + self.cols]
                .iter_mut()
                .map(LoopCell::next_sample)
                .sum();

            let rp = self.params.rows.get(row).copied().unwrap_or_default();
            let value = signal * rp.level.clamp(0.0, 1.0);
            self.row_outputs[row] = value;

            let (pl, pr) = rp.pan_gains();
            let (left, right) = (value * pl, value * pr);
            let send_a = rp.send_a.clamp(0.0, 1.0);
            let send_b = rp.send_b.clamp(0.0, 1.0);
            out.send_a.0 += left * send_a;
            out.send_a.1 += right * send_a;
            out.send_b.0 += left * send_b;
            out.send_b.1 += right * send_b;
            out.mix_left += left;
            out.mix_right += right;
        }
        out
    }

    /// Clear every cell and the transport.
    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
        self.row_outputs.fill(0.0);
        self.clock.reset();
        self.reset.reset();
        self.clock_count = 0;
        self.recording = None;
        self.record_start = 0;
    }
}

fn buffer_key(row: usize, col: usize) -> String {
    format!("cell.{row}.{col}.buffer")
}

fn loop_clocks_key(row: usize, col: usize) -> String {
    format!("cell.{row}.{col}.loopClocks")
}

impl Persist for SessionGrid {
    /// Quantize plus the buffer and loop length of every cell with content.
    fn save_state(&self) -> ModuleState {
        let mut state = ModuleState::new();
        state.set_int("quantize", self.params.quantize as i64);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let cell = &self.cells[row * self.cols + col];
                if !cell.has_content() {
                    continue;
                }
                state.set_int(&loop_clocks_key(row, col), i64::from(cell.loop_clocks));
                state.set_float_array(
                    &buffer_key(row, col),
                    cell.recorded().iter().map(|&s| f64::from(s)).collect(),
                );
            }
        }
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        if let Some(q) = state.int("quantize")? {
            if !(0..QUANTIZE_STEPS.len() as i64).contains(&q) {
                return Err(StateError::OutOfRange {
                    key: "quantize".to_string(),
                    value: q as f64,
                }
                .into());
            }
            self.params.quantize = q as usize;
        }

        let mut loaded = 0;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let key = buffer_key(row, col);
                let Some(buffer) = state.float_array(&key)? else {
                    continue;
                };
                let idx = row * self.cols + col;
                let capacity = self.cells[idx].capacity();
                if buffer.len() > capacity {
                    return Err(StateError::LengthMismatch {
                        key,
                        expected: capacity,
                        found: buffer.len(),
                    }
                    .into());
                }
                let loop_clocks = state
                    .int(&loop_clocks_key(row, col))?
                    .map_or(1, |c| c.clamp(1, i64::from(u32::MAX)) as u32);
                if self.recording == Some((row, col)) {
                    self.recording = None;
                }
                let samples: Vec<f32> = buffer.iter().map(|&s| s as f32).collect();
                self.cells[idx].load(&samples, loop_clocks);
                loaded += 1;
            }
        }
        log::debug!("session grid: state loaded, {loaded} cells");
        Ok(())
    }
}
