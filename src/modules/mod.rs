//! Module wrappers: each owns its DSP blocks, takes `&ProcessArgs` plus a
//! typed input struct per sample, and returns a typed output struct.
//!
//! Knobs live in a public `params` field; [`crate::params::ParamSpec`]
//! tables describe them for a host UI.

pub mod ad_generator;
pub mod drum_machine;
pub mod euclidean;
pub mod session;
pub mod spatial;
