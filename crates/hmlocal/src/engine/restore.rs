use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Deserialize;
use serde::Serialize;

use super::entity::Attributes;

/// Host states that carry no usable value.
const UNKNOWN_STATES: [&str; 2] = ["unknown", "unavailable"];

/// Last state of an entity, captured when it was removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoredState {
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    /// Native value of sensors and numbers, before unit conversion
    #[serde(default)]
    pub native_value: Option<serde_json::Value>,
}

impl RestoredState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            ..Self::default()
        }
    }

    /// The state, unless the host never knew it.
    pub fn known_state(&self) -> Option<&str> {
        if UNKNOWN_STATES.contains(&self.state.as_str()) {
            None
        } else {
            Some(&self.state)
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }
}

/// Restore snapshots keyed by entity unique id.
#[derive(Debug, Default)]
pub struct RestoreCache {
    states: Mutex<HashMap<String, RestoredState>>,
}

impl RestoreCache {
    pub fn insert(&self, unique_id: impl Into<String>, state: RestoredState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(unique_id.into(), state);
    }

    pub fn get(&self, unique_id: &str) -> Option<RestoredState> {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(unique_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
