//! Experiment alternatives

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// One candidate value a visitor may be shown
///
/// Identified by its position within the owning experiment. Index `0` is the
/// control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    index: usize,
    value: Value,
}

impl Alternative {
    /// Create alternative at position
    #[inline]
    #[must_use]
    pub fn new(index: usize, value: Value) -> Self {
        Self { index, value }
    }

    /// Position within the experiment
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value shown to the visitor
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Whether this is the control (first) alternative
    #[inline]
    #[must_use]
    pub fn is_control(&self) -> bool {
        self.index == 0
    }
}

impl Display for Alternative {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}
