use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dialog::DialogLibrary;
use crate::error::ExprError;
use crate::function::{ERROR_SENTINEL, Function, FunctionLibrary};
use crate::values::Values;

/// Declarative expression used for autofill, plausi and visibility conditions.
///
/// Every expression evaluates to a string; boolean operators yield `"true"` or
/// `"false"` and failed evaluations yield [`ERROR_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    Literal {
        value: String,
    },
    Value {
        id: String,
    },
    Cat {
        args: Vec<Expr>,
    },
    Equals {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    NumericCompare {
        left: Box<Expr>,
        cmp: Comparison,
        right: Box<Expr>,
    },
    Sum {
        args: Vec<Expr>,
    },
    Product {
        args: Vec<Expr>,
    },
    Matches {
        value: Box<Expr>,
        pattern: String,
    },
    And {
        expressions: Vec<Expr>,
    },
    Or {
        expressions: Vec<Expr>,
    },
    Not {
        expression: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Dialog {
        dialog: String,
        data: String,
    },
    Call {
        function: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Comparison {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl Comparison {
    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Comparison::Less => left < right,
            Comparison::LessOrEqual => left <= right,
            Comparison::Equal => left == right,
            Comparison::GreaterOrEqual => left >= right,
            Comparison::Greater => left > right,
        }
    }
}

struct EvalContext<'a> {
    functions: &'a FunctionLibrary,
    dialogs: &'a DialogLibrary,
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal {
            value: value.into(),
        }
    }

    pub fn value(id: impl Into<String>) -> Self {
        Expr::Value { id: id.into() }
    }

    /// Parses a raw config value and compiles it.
    pub fn compile_value(
        raw: &Value,
        functions: &Rc<FunctionLibrary>,
        dialogs: &Rc<DialogLibrary>,
    ) -> Result<Rc<dyn Function>, ExprError> {
        let expr: Expr = serde_json::from_value(raw.clone()).map_err(ExprError::Malformed)?;
        expr.compile(functions, dialogs)
    }

    /// Checks every reference and pattern and binds the expression to its libraries.
    pub fn compile(
        self,
        functions: &Rc<FunctionLibrary>,
        dialogs: &Rc<DialogLibrary>,
    ) -> Result<Rc<dyn Function>, ExprError> {
        self.check(functions, dialogs, &mut Vec::new())?;
        Ok(Rc::new(ExprFunction {
            expr: self,
            functions: Rc::clone(functions),
            dialogs: Rc::clone(dialogs),
        }))
    }

    fn check(
        &self,
        functions: &FunctionLibrary,
        dialogs: &DialogLibrary,
        calls: &mut Vec<String>,
    ) -> Result<(), ExprError> {
        match self {
            Expr::Literal { .. } | Expr::Value { .. } => Ok(()),
            Expr::Cat { args } | Expr::Sum { args } | Expr::Product { args } => args
                .iter()
                .try_for_each(|arg| arg.check(functions, dialogs, calls)),
            Expr::And { expressions } | Expr::Or { expressions } => expressions
                .iter()
                .try_for_each(|expr| expr.check(functions, dialogs, calls)),
            Expr::Equals { left, right } | Expr::NumericCompare { left, right, .. } => {
                left.check(functions, dialogs, calls)?;
                right.check(functions, dialogs, calls)
            }
            Expr::Matches { value, pattern } => {
                Regex::new(&anchored(pattern)).map_err(|source| ExprError::InvalidPattern {
                    pattern: pattern.clone(),
                    source,
                })?;
                value.check(functions, dialogs, calls)
            }
            Expr::Not { expression } => expression.check(functions, dialogs, calls),
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                condition.check(functions, dialogs, calls)?;
                then.check(functions, dialogs, calls)?;
                otherwise.check(functions, dialogs, calls)
            }
            Expr::Dialog { dialog, .. } => {
                if dialogs.contains(dialog) {
                    Ok(())
                } else {
                    Err(ExprError::UnknownDialog(dialog.clone()))
                }
            }
            Expr::Call { function } => {
                if calls.contains(function) {
                    return Err(ExprError::RecursiveFunction(function.clone()));
                }
                let body = functions
                    .get(function)
                    .ok_or_else(|| ExprError::UnknownFunction(function.clone()))?;
                calls.push(function.clone());
                body.check(functions, dialogs, calls)?;
                calls.pop();
                Ok(())
            }
        }
    }

    fn eval(&self, ctx: &EvalContext<'_>, values: &dyn Values) -> String {
        match self {
            Expr::Literal { value } => value.clone(),
            Expr::Value { id } => values.get_string(id),
            Expr::Cat { args } => {
                let mut out = String::new();
                for arg in args {
                    let part = arg.eval(ctx, values);
                    if part == ERROR_SENTINEL {
                        return part;
                    }
                    out.push_str(&part);
                }
                out
            }
            Expr::Equals { left, right } => {
                bool_string(left.eval(ctx, values) == right.eval(ctx, values))
            }
            Expr::NumericCompare { left, cmp, right } => {
                match (
                    parse_number(&left.eval(ctx, values)),
                    parse_number(&right.eval(ctx, values)),
                ) {
                    (Some(left), Some(right)) => bool_string(cmp.holds(left, right)),
                    _ => ERROR_SENTINEL.into(),
                }
            }
            Expr::Sum { args } => fold_numbers(args, ctx, values, 0.0, |acc, n| acc + n),
            Expr::Product { args } => fold_numbers(args, ctx, values, 1.0, |acc, n| acc * n),
            Expr::Matches { value, pattern } => {
                let text = value.eval(ctx, values);
                match Regex::new(&anchored(pattern)) {
                    Ok(regex) => bool_string(regex.is_match(&text)),
                    Err(_) => ERROR_SENTINEL.into(),
                }
            }
            Expr::And { expressions } => {
                bool_string(expressions.iter().all(|expr| expr.eval(ctx, values) == "true"))
            }
            Expr::Or { expressions } => {
                bool_string(expressions.iter().any(|expr| expr.eval(ctx, values) == "true"))
            }
            Expr::Not { expression } => match expression.eval(ctx, values).as_str() {
                "true" => "false".into(),
                "false" => "true".into(),
                _ => ERROR_SENTINEL.into(),
            },
            Expr::If {
                condition,
                then,
                otherwise,
            } => match condition.eval(ctx, values).as_str() {
                "true" => then.eval(ctx, values),
                ERROR_SENTINEL => ERROR_SENTINEL.into(),
                _ => otherwise.eval(ctx, values),
            },
            Expr::Dialog { dialog, data } => ctx
                .dialogs
                .get(dialog)
                .and_then(|dialog| dialog.data(data))
                .unwrap_or_default(),
            Expr::Call { function } => match ctx.functions.get(function) {
                Some(body) => body.eval(ctx, values),
                None => ERROR_SENTINEL.into(),
            },
        }
    }

    /// Dialog names this expression reads directly, without following `call`.
    pub fn dialog_references(&self, out: &mut BTreeSet<String>) {
        self.collect_dialogs(&FunctionLibrary::new(), out);
    }

    fn collect_parameters(&self, functions: &FunctionLibrary, out: &mut Vec<String>) {
        match self {
            Expr::Value { id } => {
                if !out.contains(id) {
                    out.push(id.clone());
                }
            }
            Expr::Call { function } => {
                if let Some(body) = functions.get(function) {
                    body.collect_parameters(functions, out);
                }
            }
            _ => self
                .children()
                .for_each(|child| child.collect_parameters(functions, out)),
        }
    }

    fn collect_dialogs(&self, functions: &FunctionLibrary, out: &mut BTreeSet<String>) {
        match self {
            Expr::Dialog { dialog, .. } => {
                out.insert(dialog.clone());
            }
            Expr::Call { function } => {
                if let Some(body) = functions.get(function) {
                    body.collect_dialogs(functions, out);
                }
            }
            _ => self
                .children()
                .for_each(|child| child.collect_dialogs(functions, out)),
        }
    }

    fn children(&self) -> Box<dyn Iterator<Item = &Expr> + '_> {
        match self {
            Expr::Literal { .. } | Expr::Value { .. } | Expr::Dialog { .. } | Expr::Call { .. } => {
                Box::new(std::iter::empty())
            }
            Expr::Cat { args } | Expr::Sum { args } | Expr::Product { args } => {
                Box::new(args.iter())
            }
            Expr::And { expressions } | Expr::Or { expressions } => Box::new(expressions.iter()),
            Expr::Equals { left, right } | Expr::NumericCompare { left, right, .. } => {
                Box::new([left.as_ref(), right.as_ref()].into_iter())
            }
            Expr::Matches { value, .. } => Box::new(std::iter::once(value.as_ref())),
            Expr::Not { expression } => Box::new(std::iter::once(expression.as_ref())),
            Expr::If {
                condition,
                then,
                otherwise,
            } => Box::new([condition.as_ref(), then.as_ref(), otherwise.as_ref()].into_iter()),
        }
    }
}

/// An [`Expr`] bound to the libraries it was compiled against.
pub struct ExprFunction {
    expr: Expr,
    functions: Rc<FunctionLibrary>,
    dialogs: Rc<DialogLibrary>,
}

impl fmt::Debug for ExprFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExprFunction").field(&self.expr).finish()
    }
}

impl Function for ExprFunction {
    fn get_string(&self, values: &dyn Values) -> String {
        let ctx = EvalContext {
            functions: &self.functions,
            dialogs: &self.dialogs,
        };
        self.expr.eval(&ctx, values)
    }

    fn parameters(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.expr.collect_parameters(&self.functions, &mut out);
        out
    }

    fn function_dialog_references(&self, out: &mut BTreeSet<String>) {
        self.expr.collect_dialogs(&self.functions, out);
    }
}

fn anchored(pattern: &str) -> String {
    format!("^(?:{pattern})$")
}

fn bool_string(value: bool) -> String {
    let text = if value { "true" } else { "false" };
    text.into()
}

fn parse_number(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn fold_numbers(
    args: &[Expr],
    ctx: &EvalContext<'_>,
    values: &dyn Values,
    init: f64,
    op: impl Fn(f64, f64) -> f64,
) -> String {
    let mut acc = init;
    for arg in args {
        let text = arg.eval(ctx, values);
        // Blank operands are untouched fields and count as zero.
        if text.trim().is_empty() {
            acc = op(acc, 0.0);
            continue;
        }
        match parse_number(&text) {
            Some(number) => acc = op(acc, number),
            None => return ERROR_SENTINEL.into(),
        }
    }
    format_number(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::StaticDialog;
    use crate::values::SimpleValues;
    use serde_json::json;

    fn libraries() -> (Rc<FunctionLibrary>, Rc<DialogLibrary>) {
        let mut functions = FunctionLibrary::new();
        functions.insert(
            "greeting",
            Expr::Cat {
                args: vec![Expr::literal("Hello "), Expr::value("name")],
            },
        );
        functions.insert(
            "loop",
            Expr::Call {
                function: "loop".into(),
            },
        );
        let mut dialogs = DialogLibrary::new();
        dialogs.add(
            "Recipient",
            Rc::new(StaticDialog::with_data([("line1", "Jane Doe")])),
        );
        (Rc::new(functions), Rc::new(dialogs))
    }

    fn compile(raw: Value) -> Result<Rc<dyn Function>, ExprError> {
        let (functions, dialogs) = libraries();
        Expr::compile_value(&raw, &functions, &dialogs)
    }

    #[test]
    fn cat_reads_values() {
        let function = compile(json!({
            "op": "cat",
            "args": [{ "op": "value", "id": "A" }, { "op": "literal", "value": "!" }]
        }))
        .expect("compile");
        let values: SimpleValues = [("A", "x")].into_iter().collect();
        assert_eq!(function.get_string(&values), "x!");
        assert_eq!(function.parameters(), vec!["A"]);
    }

    #[test]
    fn numeric_compare_on_text_is_an_error() {
        let function = compile(json!({
            "op": "numeric_compare",
            "left": { "op": "value", "id": "N" },
            "cmp": ">",
            "right": { "op": "literal", "value": "0" }
        }))
        .expect("compile");
        let negative: SimpleValues = [("N", "-1")].into_iter().collect();
        let text: SimpleValues = [("N", "abc")].into_iter().collect();
        assert!(!function.get_boolean(&negative));
        assert_eq!(function.get_string(&text), ERROR_SENTINEL);
        assert!(!function.get_boolean(&text));
    }

    #[test]
    fn sum_formats_whole_numbers_without_fraction() {
        let function = compile(json!({
            "op": "sum",
            "args": [{ "op": "value", "id": "amount" }, { "op": "literal", "value": "2000" }]
        }))
        .expect("compile");
        let values: SimpleValues = [("amount", "10000")].into_iter().collect();
        assert_eq!(function.get_string(&values), "12000");
        let values: SimpleValues = [("amount", "0,5")].into_iter().collect();
        assert_eq!(function.get_string(&values), "2000.5");
        assert_eq!(function.get_string(&SimpleValues::new()), "2000");
        let values: SimpleValues = [("amount", "ten")].into_iter().collect();
        assert_eq!(function.get_string(&values), ERROR_SENTINEL);
    }

    #[test]
    fn matches_requires_full_match() {
        let function = compile(json!({
            "op": "matches",
            "value": { "op": "value", "id": "zip" },
            "pattern": "[0-9]{5}"
        }))
        .expect("compile");
        let good: SimpleValues = [("zip", "80331")].into_iter().collect();
        let bad: SimpleValues = [("zip", "803310")].into_iter().collect();
        assert!(function.get_boolean(&good));
        assert!(!function.get_boolean(&bad));
    }

    #[test]
    fn invalid_pattern_fails_compilation() {
        let err = compile(json!({
            "op": "matches",
            "value": { "op": "value", "id": "zip" },
            "pattern": "("
        }))
        .unwrap_err();
        assert!(matches!(err, ExprError::InvalidPattern { .. }));
    }

    #[test]
    fn dialog_reads_are_reported() {
        let function = compile(json!({ "op": "dialog", "dialog": "Recipient", "data": "line1" }))
            .expect("compile");
        let mut dialogs = BTreeSet::new();
        function.function_dialog_references(&mut dialogs);
        assert_eq!(dialogs, BTreeSet::from(["Recipient".to_string()]));
        assert_eq!(function.get_string(&SimpleValues::new()), "Jane Doe");
    }

    #[test]
    fn unknown_references_fail_compilation() {
        assert!(matches!(
            compile(json!({ "op": "dialog", "dialog": "Nope", "data": "x" })),
            Err(ExprError::UnknownDialog(name)) if name == "Nope"
        ));
        assert!(matches!(
            compile(json!({ "op": "call", "function": "missing" })),
            Err(ExprError::UnknownFunction(_))
        ));
        assert!(matches!(
            compile(json!({ "op": "call", "function": "loop" })),
            Err(ExprError::RecursiveFunction(_))
        ));
        assert!(matches!(
            compile(json!({ "op": "bogus" })),
            Err(ExprError::Malformed(_))
        ));
    }

    #[test]
    fn call_exposes_parameters_of_the_callee() {
        let function = compile(json!({ "op": "call", "function": "greeting" })).expect("compile");
        let values: SimpleValues = [("name", "Ada")].into_iter().collect();
        assert_eq!(function.get_string(&values), "Hello Ada");
        assert_eq!(function.parameters(), vec!["name"]);
    }

    #[test]
    fn if_branches_on_condition() {
        let function = compile(json!({
            "op": "if",
            "condition": { "op": "value", "id": "flag" },
            "then": { "op": "literal", "value": "yes" },
            "otherwise": { "op": "literal", "value": "no" }
        }))
        .expect("compile");
        let on: SimpleValues = [("flag", "true")].into_iter().collect();
        assert_eq!(function.get_string(&on), "yes");
        assert_eq!(function.get_string(&SimpleValues::new()), "no");
        assert_eq!(function.parameters(), vec!["flag"]);
    }
}
