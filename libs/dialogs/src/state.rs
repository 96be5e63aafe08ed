use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Persisted position of one stack frame. A frame is only mutated while
/// it is active (top of stack) or being explicitly resumed or ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FrameState {
    NotStarted,
    AwaitingInput {
        step_index: usize,
        options: Value,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        values: BTreeMap<String, Value>,
    },
    Ended {
        result: Option<Value>,
    },
    Cancelled,
}

/// One entry on the dialog stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DialogInstance {
    pub id: String,
    pub instance_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub state: FrameState,
}

impl DialogInstance {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            id: id.into(),
            instance_id: Uuid::new_v4().to_string(),
            version,
            state: FrameState::NotStarted,
        }
    }
}

/// The dialog stack persisted per conversation. Innermost dialog last;
/// exactly one frame (the top) is active at a time. The blob round-trips
/// exactly through serde across save/load cycles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DialogState {
    #[serde(default)]
    pub stack: Vec<DialogInstance>,
}

impl DialogState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// The active (innermost) dialog instance.
    pub fn active(&self) -> Option<&DialogInstance> {
        self.stack.last()
    }

    pub fn active_mut(&mut self) -> Option<&mut DialogInstance> {
        self.stack.last_mut()
    }
}
