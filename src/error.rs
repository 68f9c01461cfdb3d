use std::fmt;

/// Errors from control-thread operations (state import, JSON decode).
/// Audio-rate processing never fails.
#[derive(Debug)]
pub enum CoreError {
    State(StateError),
    Json(serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
    LengthMismatch {
        key: String,
        expected: usize,
        found: usize,
    },
    OutOfRange {
        key: String,
        value: f64,
    },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::State(e) => write!(f, "State error: {e}"),
            CoreError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::State(e) => Some(e),
            CoreError::Json(e) => Some(e),
        }
    }
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::TypeMismatch { key, expected } => write!(f, "Key '{key}' is not a {expected}"),
            StateError::LengthMismatch { key, expected, found } => {
                write!(f, "Key '{key}' holds {found} values, at most {expected} expected")
            }
            StateError::OutOfRange { key, value } => write!(f, "Key '{key}' value {value} is out of range"),
        }
    }
}

impl std::error::Error for StateError {}

impl From<StateError> for CoreError {
    fn from(e: StateError) -> Self {
        CoreError::State(e)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Json(e)
    }
}
