//! Mixer: stereo channel strips chained across modules, with a block-level
//! solo snapshot.
//!
//! Every strip in a chain first reports its solo flag into a [`ChainState`];
//! the snapshot is then passed by reference to every strip's gain stage so all
//! strips in the block agree on whether anything is soloed.

use super::gate::SchmittTrigger;
use crate::error::{CoreError, StateError};
use crate::state::{ModuleState, Persist};

/// Output clamp for every mixer module, in volts.
pub const OUTPUT_LIMIT: f32 = 10.0;

/// Solo consensus for one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainState {
    pub any_solo: bool,
}

impl ChainState {
    /// Snapshot the solo flags of every strip in the chain.
    pub fn resolve<'a>(strips: impl IntoIterator<Item = &'a ChannelStrip>) -> Self {
        ChainState {
            any_solo: strips.into_iter().any(|s| s.solo),
        }
    }
}

/// Per-sample inputs of one strip. `None` means unpatched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripInput {
    pub left: f32,
    /// Mono-normalled to `left` when unpatched.
    pub right: Option<f32>,
    pub level_cv: Option<f32>,
    pub duck_cv: Option<f32>,
    pub mute_trig: Option<f32>,
    pub solo_trig: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct ChannelStrip {
    /// Fader level, 0..2.
    pub level: f32,
    /// Sidechain duck depth, 0..1.
    pub duck_amount: f32,
    pub mute: bool,
    pub solo: bool,
    mute_trigger: SchmittTrigger,
    solo_trigger: SchmittTrigger,
}

impl Default for ChannelStrip {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelStrip {
    pub fn new() -> Self {
        ChannelStrip {
            level: 1.0,
            duck_amount: 0.0,
            mute: false,
            solo: false,
            mute_trigger: SchmittTrigger::new(),
            solo_trigger: SchmittTrigger::new(),
        }
    }

    /// Toggle mute/solo on trigger edges. Runs before the chain snapshot is
    /// taken so a solo toggled this block is already visible to its neighbours.
    pub fn process_triggers(&mut self, input: &StripInput) {
        if let Some(v) = input.mute_trig {
            if self.mute_trigger.process(v) {
                self.mute = !self.mute;
            }
        }
        if let Some(v) = input.solo_trig {
            if self.solo_trigger.process(v) {
                self.solo = !self.solo;
            }
        }
    }

    /// Whether the strip is silenced, either directly or by another strip's solo.
    pub fn is_silenced(&self, chain: &ChainState) -> bool {
        self.mute || (chain.any_solo && !self.solo)
    }

    /// Level after CV, 0..2. CV is scaled to ±1 per 10 V.
    pub fn effective_level(&self, level_cv: Option<f32>) -> f32 {
        match level_cv {
            Some(cv) => (self.level + (cv / 10.0).clamp(-1.0, 1.0)).clamp(0.0, 2.0),
            None => self.level,
        }
    }

    /// Sidechain duck gain: `1 - duck·amount·3`, with duck in 0..1 per 10 V.
    pub fn duck_gain(&self, duck_cv: Option<f32>) -> f32 {
        match duck_cv {
            Some(cv) => {
                let duck = (cv / 10.0).clamp(0.0, 1.0);
                (1.0 - duck * self.duck_amount * 3.0).clamp(0.0, 1.0)
            }
            None => 1.0,
        }
    }

    /// Stereo contribution of this strip to its module's mix.
    #[inline]
    pub fn process(&self, chain: &ChainState, input: &StripInput) -> (f32, f32) {
        if self.is_silenced(chain) {
            return (0.0, 0.0);
        }
        let gain = self.effective_level(input.level_cv) * self.duck_gain(input.duck_cv);
        let right = input.right.unwrap_or(input.left);
        (input.left * gain, right * gain)
    }

    pub fn reset(&mut self) {
        self.mute_trigger.reset();
        self.solo_trigger.reset();
    }
}

/// A mixer module: a bank of strips summed into a stereo pair.
#[derive(Debug, Clone)]
pub struct MixerModule {
    pub strips: Vec<ChannelStrip>,
}

impl MixerModule {
    pub fn new(strips: usize) -> Self {
        MixerModule {
            strips: (0..strips.max(1)).map(|_| ChannelStrip::new()).collect(),
        }
    }

    /// Mix this module's strips, add the upstream chain input and clamp.
    pub fn process(&self, chain: &ChainState, inputs: &[StripInput], chain_in: (f32, f32)) -> (f32, f32) {
        let mut left = chain_in.0;
        let mut right = chain_in.1;
        for (strip, input) in self.strips.iter().zip(inputs) {
            let (l, r) = strip.process(chain, input);
            left += l;
            right += r;
        }
        (
            left.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT),
            right.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT),
        )
    }
}

/// Mixer modules chained left to right; each one's output feeds the next
/// module's chain input, and the last module's output is the chain output.
#[derive(Debug, Clone)]
pub struct MixerChain {
    modules: Vec<MixerModule>,
}

impl MixerChain {
    /// Build a chain from per-module strip counts.
    pub fn new(strip_counts: &[usize]) -> Self {
        MixerChain {
            modules: strip_counts.iter().map(|&n| MixerModule::new(n)).collect(),
        }
    }

    pub fn modules(&self) -> &[MixerModule] {
        &self.modules
    }

    pub fn module_mut(&mut self, index: usize) -> Option<&mut MixerModule> {
        self.modules.get_mut(index)
    }

    pub fn strips(&self) -> impl Iterator<Item = &ChannelStrip> {
        self.modules.iter().flat_map(|m| m.strips.iter())
    }

    fn strips_mut(&mut self) -> impl Iterator<Item = &mut ChannelStrip> {
        self.modules.iter_mut().flat_map(|m| m.strips.iter_mut())
    }

    pub fn strip_count(&self) -> usize {
        self.modules.iter().map(|m| m.strips.len()).sum()
    }

    /// Solo consensus across every module in the chain.
    pub fn snapshot(&self) -> ChainState {
        ChainState::resolve(self.strips())
    }

    /// Solo one strip (by flat index) and clear every other solo in the chain.
    pub fn exclusive_solo(&mut self, index: usize) {
        for (i, strip) in self.strips_mut().enumerate() {
            strip.solo = i == index;
        }
    }

    /// Process one sample. `inputs[m]` holds the strip inputs of module `m`;
    /// missing entries are silence. Returns the last module's output.
    pub fn process(&mut self, inputs: &[&[StripInput]]) -> (f32, f32) {
        for (module, module_inputs) in self.modules.iter_mut().zip(inputs) {
            for (strip, input) in module.strips.iter_mut().zip(module_inputs.iter()) {
                strip.process_triggers(input);
            }
        }

        let chain = self.snapshot();
        let mut out = (0.0, 0.0);
        for (m, module) in self.modules.iter().enumerate() {
            let module_inputs = inputs.get(m).copied().unwrap_or(&[]);
            out = module.process(&chain, module_inputs, out);
        }
        out
    }

    pub fn reset(&mut self) {
        for strip in self.strips_mut() {
            strip.reset();
        }
    }
}

impl Persist for MixerChain {
    fn save_state(&self) -> ModuleState {
        let mut state = ModuleState::new();
        state.set_bool_array("mute", self.strips().map(|s| s.mute).collect());
        state.set_bool_array("solo", self.strips().map(|s| s.solo).collect());
        state.set_float_array("level", self.strips().map(|s| s.level as f64).collect());
        state
    }

    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError> {
        let count = self.strip_count();
        let check = |key: &str, found: usize| -> Result<(), CoreError> {
            if found > count {
                return Err(StateError::LengthMismatch {
                    key: key.to_string(),
                    expected: count,
                    found,
                }
                .into());
            }
            Ok(())
        };

        let mute = state.bool_array("mute")?;
        let solo = state.bool_array("solo")?;
        let level = state.float_array("level")?;
        if let Some(v) = &mute {
            check("mute", v.len())?;
        }
        if let Some(v) = &solo {
            check("solo", v.len())?;
        }
        if let Some(v) = &level {
            check("level", v.len())?;
            if let Some(bad) = v.iter().find(|l| !(0.0..=2.0).contains(*l)) {
                return Err(StateError::OutOfRange {
                    key: "level".to_string(),
                    value: *bad,
                }
                .into());
            }
        }

        for (i, strip) in self.strips_mut().enumerate() {
            if let Some(m) = mute.as_ref().and_then(|v| v.get(i)) {
                strip.mute = *m;
            }
            if let Some(s) = solo.as_ref().and_then(|v| v.get(i)) {
                strip.solo = *s;
            }
            if let Some(l) = level.as_ref().and_then(|v| v.get(i)) {
                strip.level = *l as f32;
            }
        }
        log::debug!("mixer chain: loaded state for {count} strips");
        Ok(())
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    x.tanh()
}
