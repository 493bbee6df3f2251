use std::collections::BTreeMap;

use form_model::FormEvent;
use serde::{Deserialize, Serialize};

use crate::session::{InputError, Session};

/// One scripted interaction with a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    /// A user edit of one field.
    Set { id: String, value: String },
    /// A dialog completing with new data.
    Dialog {
        name: String,
        #[serde(default)]
        data: BTreeMap<String, String>,
    },
}

/// Outcome of a single step, as emitted in JSON mode.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: ScriptStep,
    pub events: Vec<FormEvent>,
}

pub fn parse_script(json: &str) -> Result<Vec<ScriptStep>, serde_json::Error> {
    serde_json::from_str(json)
}

pub fn apply_step(
    session: &mut Session,
    step: &ScriptStep,
) -> Result<Vec<FormEvent>, InputError> {
    match step {
        ScriptStep::Set { id, value } => session.set(id, value),
        ScriptStep::Dialog { name, data } => session.complete_dialog(name, data),
    }
}
