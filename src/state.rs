//! Persisted module state.
//!
//! A [`ModuleState`] is a flat map of named primitive values. The host owns
//! the file format; modules only read and write keys through the typed
//! accessors here. Missing keys are `Ok(None)` so a module keeps its current
//! value, while a key holding the wrong type is an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, StateError};

/// A single persisted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    BoolArray(Vec<bool>),
    FloatArray(Vec<f64>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleState {
    values: BTreeMap<String, StateValue>,
}

/// Modules with state the host should save with a patch.
pub trait Persist {
    fn save_state(&self) -> ModuleState;

    /// Apply a snapshot. Keys absent from `state` leave the module untouched.
    fn load_state(&mut self, state: &ModuleState) -> Result<(), CoreError>;
}

fn mismatch(key: &str, expected: &'static str) -> CoreError {
    StateError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
    .into()
}

impl ModuleState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), StateValue::Bool(value));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), StateValue::Int(value));
    }

    pub fn set_float(&mut self, key: &str, value: f64) {
        self.values.insert(key.to_string(), StateValue::Float(value));
    }

    pub fn set_bool_array(&mut self, key: &str, value: Vec<bool>) {
        self.values.insert(key.to_string(), StateValue::BoolArray(value));
    }

    pub fn set_float_array(&mut self, key: &str, value: Vec<f64>) {
        self.values.insert(key.to_string(), StateValue::FloatArray(value));
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>, CoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(StateValue::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(mismatch(key, "bool")),
        }
    }

    pub fn int(&self, key: &str) -> Result<Option<i64>, CoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(StateValue::Int(i)) => Ok(Some(*i)),
            Some(_) => Err(mismatch(key, "integer")),
        }
    }

    /// Integers are accepted too, since JSON does not distinguish `1` from `1.0`.
    pub fn float(&self, key: &str) -> Result<Option<f64>, CoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(StateValue::Float(v)) => Ok(Some(*v)),
            Some(StateValue::Int(i)) => Ok(Some(*i as f64)),
            Some(_) => Err(mismatch(key, "float")),
        }
    }

    pub fn bool_array(&self, key: &str) -> Result<Option<Vec<bool>>, CoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(StateValue::BoolArray(v)) => Ok(Some(v.clone())),
            Some(StateValue::FloatArray(v)) if v.is_empty() => Ok(Some(Vec::new())),
            Some(_) => Err(mismatch(key, "bool array")),
        }
    }

    /// An empty JSON array decodes as a bool array; it is accepted here as an
    /// empty float array.
    pub fn float_array(&self, key: &str) -> Result<Option<Vec<f64>>, CoreError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(StateValue::FloatArray(v)) => Ok(Some(v.clone())),
            Some(StateValue::BoolArray(v)) if v.is_empty() => Ok(Some(Vec::new())),
            Some(_) => Err(mismatch(key, "float array")),
        }
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut s = ModuleState::new();
        s.set_bool("on", true);
        s.set_int("mode", 2);
        s.set_float("level", 0.5);
        s.set_float_array("gains", vec![1.0, -3.5]);
        s.set_bool_array("mute", vec![true, false]);

        assert_eq!(s.bool("on").unwrap(), Some(true));
        assert_eq!(s.int("mode").unwrap(), Some(2));
        assert_eq!(s.float("level").unwrap(), Some(0.5));
        assert_eq!(s.float("mode").unwrap(), Some(2.0), "ints widen to float");
        assert_eq!(s.float_array("gains").unwrap(), Some(vec![1.0, -3.5]));
        assert_eq!(s.bool_array("mute").unwrap(), Some(vec![true, false]));
        assert_eq!(s.len(), 5);
    }

    #[test]
    fn missing_key_is_none() {
        let s = ModuleState::new();
        assert!(s.is_empty());
        assert_eq!(s.bool("nope").unwrap(), None);
        assert_eq!(s.float_array("nope").unwrap(), None);
    }

    #[test]
    fn wrong_type_is_an_error() {
        let mut s = ModuleState::new();
        s.set_float("on", 1.0);
        let err = s.bool("on").unwrap_err();
        assert!(matches!(err, CoreError::State(StateError::TypeMismatch { .. })));
        assert_eq!(err.to_string(), "State error: Key 'on' is not a bool");
    }

    #[test]
    fn json_round_trip_keeps_types() {
        let mut s = ModuleState::new();
        s.set_bool("autoRouteEnabled", false);
        s.set_int("style", 3);
        s.set_float_array("bpfCutoffs", vec![200.0, 1000.5, 5000.0]);
        let json = s.to_json().unwrap();
        assert_eq!(json, r#"{"autoRouteEnabled":false,"bpfCutoffs":[200.0,1000.5,5000.0],"style":3}"#);
        let back = ModuleState::from_json(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn empty_array_reads_as_either_kind() {
        let s = ModuleState::from_json(r#"{"buffer":[]}"#).unwrap();
        assert_eq!(s.float_array("buffer").unwrap(), Some(Vec::new()));
        assert_eq!(s.bool_array("buffer").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = ModuleState::from_json("{not json").unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
        let err = ModuleState::from_json(r#"{"x": {"nested": 1}}"#).unwrap_err();
        assert!(matches!(err, CoreError::Json(_)));
    }
}
