use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::expr::Expr;
use crate::values::Values;

/// Marker returned by expressions whose evaluation failed.
pub const ERROR_SENTINEL: &str = "!¤£!FEHLERHAFTE DATEN!¤£!";

/// A pure expression evaluated against a read-only value snapshot.
pub trait Function: fmt::Debug {
    fn get_string(&self, values: &dyn Values) -> String;

    /// Only the literal result `"true"` counts as true; the error sentinel does not.
    fn get_boolean(&self, values: &dyn Values) -> bool {
        self.get_string(values) == "true"
    }

    /// Ids of the fields this function reads.
    fn parameters(&self) -> Vec<String>;

    /// Adds the names of all function dialogs this function reads from.
    fn function_dialog_references(&self, out: &mut BTreeSet<String>);
}

/// Stand-in for missing or malformed plausibility rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl Function for AlwaysTrue {
    fn get_string(&self, _values: &dyn Values) -> String {
        "true".into()
    }

    fn parameters(&self) -> Vec<String> {
        Vec::new()
    }

    fn function_dialog_references(&self, _out: &mut BTreeSet<String>) {}
}

/// Named expressions that other expressions reach through `call`.
#[derive(Debug, Clone, Default)]
pub struct FunctionLibrary {
    functions: BTreeMap<String, Expr>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from the `functions` section of a form config.
    ///
    /// Entries that do not parse as expressions are logged and left out.
    pub fn from_config(functions: &BTreeMap<String, Value>) -> Self {
        let mut library = Self::new();
        for (name, raw) in functions {
            match serde_json::from_value::<Expr>(raw.clone()) {
                Ok(expr) => library.insert(name.clone(), expr),
                Err(err) => warn!(function = %name, error = %err, "ignoring malformed function"),
            }
        }
        library
    }

    pub fn insert(&mut self, name: impl Into<String>, expr: Expr) {
        self.functions.insert(name.into(), expr);
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}
