use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::control::ControlConfig;
use crate::error::FormModelError;
use crate::expr::Expr;

/// A named visibility condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VisibilityGroupConfig {
    pub id: String,
    #[schemars(with = "Expr")]
    pub condition: Value,
}

/// One tab of the form; buttons are registered after the tab's controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct TabConfig {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub controls: Vec<ControlConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ControlConfig>,
}

/// Top-level form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct FormConfig {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tabs: Vec<TabConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visibilities: Vec<VisibilityGroupConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(with = "BTreeMap<String, Expr>")]
    pub functions: BTreeMap<String, Value>,
}

impl FormConfig {
    pub fn from_json_str(json: &str) -> Result<Self, FormModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FormModelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Every control and button in registration order.
    pub fn all_controls(&self) -> impl Iterator<Item = &ControlConfig> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.controls.iter().chain(tab.buttons.iter()))
    }

    /// Names of every dialog any expression of the form reads from.
    pub fn referenced_dialogs(&self) -> BTreeSet<String> {
        let expressions = self
            .all_controls()
            .flat_map(|control| control.autofill.iter().chain(control.plausi.iter()))
            .chain(self.visibilities.iter().map(|group| &group.condition))
            .chain(self.functions.values());
        let mut names = BTreeSet::new();
        for raw in expressions {
            if let Ok(expr) = serde_json::from_value::<Expr>(raw.clone()) {
                expr.dialog_references(&mut names);
            }
        }
        names
    }

    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(FormConfig)).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::control::ControlType;
    use serde_json::json;

    #[test]
    fn buttons_follow_controls_within_a_tab() {
        let config: FormConfig = serde_json::from_value(json!({
            "title": "Order",
            "tabs": [
                {
                    "id": "main",
                    "controls": [{ "id": "name", "type": "textfield" }],
                    "buttons": [{ "id": "next", "type": "button" }]
                },
                { "id": "extra", "controls": [{ "id": "note", "type": "textarea" }] }
            ]
        }))
        .expect("deserialize");
        let ids: Vec<_> = config.all_controls().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["name", "next", "note"]);
        assert_eq!(config.tabs[0].buttons[0].kind, ControlType::Button);
    }

    #[test]
    fn referenced_dialogs_cover_every_expression_site() {
        let config: FormConfig = serde_json::from_value(json!({
            "visibilities": [
                { "id": "g", "condition": { "op": "dialog", "dialog": "Gate", "data": "open" } }
            ],
            "functions": {
                "f": { "op": "dialog", "dialog": "Lib", "data": "x" }
            },
            "tabs": [{
                "controls": [
                    { "id": "a", "type": "textfield", "autofill": { "op": "dialog", "dialog": "Fill", "data": "a" } },
                    { "id": "b", "type": "textfield", "plausi": { "op": "broken" } }
                ]
            }]
        }))
        .expect("deserialize");
        let names: Vec<_> = config.referenced_dialogs().into_iter().collect();
        assert_eq!(names, vec!["Fill", "Gate", "Lib"]);
    }

    #[test]
    fn schema_describes_expressions() {
        let schema = FormConfig::json_schema();
        let text = schema.to_string();
        assert!(text.contains("numeric_compare"));
        assert!(text.contains("visibilities"));
    }
}
