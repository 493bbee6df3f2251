use serde::{Deserialize, Serialize};

use crate::model::FormModel;

/// Outcome of checking every PLAUSI of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Visible value-bearing fields whose PLAUSI fails.
    pub invalid: Vec<String>,
    /// Failing fields that are currently hidden and therefore do not count.
    pub hidden_invalid: Vec<String>,
}

/// Collects failing fields; hidden fields are reported separately and do not
/// make the form invalid.
pub fn validate(model: &FormModel) -> ValidationResult {
    let mut invalid = Vec::new();
    let mut hidden_invalid = Vec::new();

    for control in model.controls() {
        if !control.kind().is_value_bearing() || control.is_okay() {
            continue;
        }
        if model.is_visible(control.id()).unwrap_or(true) {
            invalid.push(control.id().to_string());
        } else {
            hidden_invalid.push(control.id().to_string());
        }
    }

    ValidationResult {
        valid: invalid.is_empty(),
        invalid,
        hidden_invalid,
    }
}
