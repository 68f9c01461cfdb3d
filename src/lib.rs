pub mod dsp;
pub mod error;
pub mod modules;
pub mod params;
pub mod state;

use crate::dsp::panner::{vbap_gains, Position};
use crate::dsp::renderer::DrumPattern;
use crate::error::CoreError;
use crate::modules::ad_generator::AdGenerator;
use crate::modules::drum_machine::DrumMachine;
use crate::modules::euclidean::EuclideanSequencer;
use crate::modules::session::SessionGrid;
use crate::modules::spatial::SpatialPanner;
use crate::params::ParamSpec;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Module names accepted by [`module_params`].
pub const MODULE_NAMES: [&str; 5] = ["ad_generator", "spatial", "euclidean", "drum_machine", "session"];

/// WASM-exposed: return the madzine-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Knob table for a module by name.
pub fn module_params(name: &str) -> Option<&'static [ParamSpec]> {
    match name {
        "ad_generator" => Some(AdGenerator::params()),
        "spatial" => Some(SpatialPanner::params()),
        "euclidean" => Some(EuclideanSequencer::params()),
        "drum_machine" => Some(DrumMachine::params()),
        "session" => Some(SessionGrid::params()),
        _ => None,
    }
}

/// Render a JSON drum pattern to WAV bytes.
pub fn render_pattern_json(json: &str, sample_rate: u32) -> Result<Vec<u8>, CoreError> {
    let pattern: DrumPattern = serde_json::from_str(json)?;
    Ok(dsp::renderer::render_wav(&pattern, sample_rate))
}

/// WASM-exposed: Euclidean rhythm as an array of booleans.
#[wasm_bindgen]
pub fn euclidean_pattern(length: usize, fill: usize, shift: i32) -> Result<JsValue, JsValue> {
    let steps = dsp::euclid::generate(length, fill, shift);
    serde_wasm_bindgen::to_value(&steps).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: the eight speaker gains for a source at `(x, y, z)`.
#[wasm_bindgen]
pub fn spatial_gains(x: f32, y: f32, z: f32) -> Result<JsValue, JsValue> {
    let gains = vbap_gains(Position::new(x, y, z));
    serde_wasm_bindgen::to_value(&gains).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: parameter descriptions for the named module.
#[wasm_bindgen]
pub fn describe_params(module: &str) -> Result<JsValue, JsValue> {
    let params = module_params(module).ok_or_else(|| JsValue::from_str(&format!("Unknown module '{module}'")))?;
    serde_wasm_bindgen::to_value(&params).map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: render a JSON drum pattern to a WAV byte array.
#[wasm_bindgen]
pub fn render_drum_pattern_wav(pattern_json: &str, sample_rate: u32) -> Result<Vec<u8>, JsValue> {
    render_pattern_json(pattern_json, sample_rate).map_err(|e| JsValue::from_str(&format!("{e}")))
}
