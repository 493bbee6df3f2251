use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::ControlType;
use crate::error::SnapshotError;

/// State of one control at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ControlType,
    pub value: String,
    pub okay: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub id: String,
    pub visible: bool,
}

/// Point-in-time copy of a whole form, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FormSnapshot {
    pub controls: Vec<ControlState>,
    #[serde(default)]
    pub groups: Vec<GroupState>,
}

impl FormSnapshot {
    pub fn control(&self, id: &str) -> Option<&ControlState> {
        self.controls.iter().find(|control| control.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&GroupState> {
        self.groups.iter().find(|group| group.id == id)
    }

    /// Values of value-bearing controls, usable as presets for a later session.
    pub fn presets(&self) -> HashMap<String, String> {
        self.controls
            .iter()
            .filter(|control| control.kind.is_value_bearing())
            .map(|control| (control.id.clone(), control.value.clone()))
            .collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}
