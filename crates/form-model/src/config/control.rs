use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expr::Expr;

/// Kind of a form element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Button,
    Checkbox,
    Combobox,
    Label,
    Listbox,
    Textarea,
    Textfield,
    Separator,
    Glue,
}

impl ControlType {
    /// Elements that hold a value the user can edit.
    pub fn is_value_bearing(self) -> bool {
        matches!(
            self,
            ControlType::Textfield
                | ControlType::Textarea
                | ControlType::Combobox
                | ControlType::Checkbox
                | ControlType::Listbox
        )
    }

    /// Elements that are ever shown; layout helpers never are.
    pub fn can_be_visible(self) -> bool {
        self.is_value_bearing() || matches!(self, ControlType::Button | ControlType::Label)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ControlType::Button => "button",
            ControlType::Checkbox => "checkbox",
            ControlType::Combobox => "combobox",
            ControlType::Label => "label",
            ControlType::Listbox => "listbox",
            ControlType::Textarea => "textarea",
            ControlType::Textfield => "textfield",
            ControlType::Separator => "separator",
            ControlType::Glue => "glue",
        }
    }
}

/// Declaration of a single form element.
///
/// `autofill` and `plausi` are kept as raw JSON so that a malformed rule only
/// disables that rule instead of rejecting the whole form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ControlConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ControlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Expr>")]
    pub autofill: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<Expr>")]
    pub plausi: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ControlConfig {
    pub fn new(id: impl Into<String>, kind: ControlType) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            autofill: None,
            plausi: None,
            groups: Vec::new(),
            options: Vec::new(),
        }
    }
}
