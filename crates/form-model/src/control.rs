use std::rc::Rc;

use tracing::warn;

use crate::config::{ControlConfig, ControlType};
use crate::dialog::DialogLibrary;
use crate::expr::Expr;
use crate::function::{AlwaysTrue, Function, FunctionLibrary};
use crate::values::{OverlayValues, SimpleValues, Values};
use crate::visibility::VisibilityGroup;

/// Membership of a control in a visibility group.
///
/// Ids that named no group when the model was built stay unresolved and are
/// ignored by every visibility computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMembership {
    Resolved(usize),
    Unresolved(String),
}

/// One form element together with its rules and reverse dependencies.
#[derive(Debug, Clone)]
pub struct Control {
    id: String,
    kind: ControlType,
    value: String,
    okay: bool,
    autofill: Option<Rc<dyn Function>>,
    plausi: Rc<dyn Function>,
    options: Vec<String>,
    groups: Vec<GroupMembership>,
    pub(crate) depending_autofill: Vec<usize>,
    pub(crate) depending_plausi: Vec<usize>,
    pub(crate) depending_groups: Vec<usize>,
}

impl Control {
    /// Builds a control, replacing rules that fail to compile by permissive defaults.
    pub fn from_config(
        config: &ControlConfig,
        functions: &Rc<FunctionLibrary>,
        dialogs: &Rc<DialogLibrary>,
    ) -> Self {
        let plausi = match &config.plausi {
            Some(raw) => Expr::compile_value(raw, functions, dialogs).unwrap_or_else(|err| {
                warn!(control = %config.id, error = %err, "ignoring broken PLAUSI");
                Rc::new(AlwaysTrue)
            }),
            None => Rc::new(AlwaysTrue),
        };
        let autofill = config.autofill.as_ref().and_then(|raw| {
            Expr::compile_value(raw, functions, dialogs)
                .map_err(|err| warn!(control = %config.id, error = %err, "ignoring broken AUTOFILL"))
                .ok()
        });
        Self::new(
            config.id.clone(),
            config.kind,
            autofill,
            plausi,
            config.options.clone(),
        )
    }

    pub fn new(
        id: impl Into<String>,
        kind: ControlType,
        autofill: Option<Rc<dyn Function>>,
        plausi: Rc<dyn Function>,
        options: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            value: String::new(),
            okay: true,
            autofill,
            plausi,
            options,
            groups: Vec::new(),
            depending_autofill: Vec::new(),
            depending_plausi: Vec::new(),
            depending_groups: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ControlType {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub(crate) fn set_value(&mut self, value: String) {
        self.value = value;
    }

    pub fn is_okay(&self) -> bool {
        self.okay
    }

    pub fn set_okay(&mut self, values: &dyn Values) {
        self.okay = self.plausi.get_boolean(values);
    }

    pub fn autofill(&self) -> Option<&dyn Function> {
        self.autofill.as_deref()
    }

    pub fn plausi(&self) -> &dyn Function {
        self.plausi.as_ref()
    }

    pub fn memberships(&self) -> &[GroupMembership] {
        &self.groups
    }

    pub(crate) fn add_group(&mut self, membership: GroupMembership) {
        self.groups.push(membership);
    }

    pub(crate) fn add_depending_group(&mut self, group: usize) {
        if !self.depending_groups.contains(&group) {
            self.depending_groups.push(group);
        }
    }

    /// Default value of the control: the AUTOFILL result, else the first option
    /// of a combobox, else empty.
    pub fn compute_value(&self, values: &dyn Values) -> String {
        if let Some(autofill) = &self.autofill {
            autofill.get_string(values)
        } else if self.kind == ControlType::Combobox && !self.options.is_empty() {
            self.options[0].clone()
        } else {
            String::new()
        }
    }

    /// Records `value` for this control and recomputes every control whose
    /// AUTOFILL reads it, transitively.
    ///
    /// `modified` doubles as the visited set: a control already in it is never
    /// computed again, which bounds the walk on cyclic graphs. Dependents read
    /// the values known when their parent was entered, not those of siblings
    /// computed later in the same walk. The walk keeps its own stack, so long
    /// AUTOFILL chains neither copy the snapshot per step nor grow the call stack.
    pub fn compute_new_values(
        &self,
        controls: &[Control],
        value: String,
        values: &SimpleValues,
        modified: &mut SimpleValues,
    ) {
        struct Frame<'a> {
            control: &'a Control,
            visible: usize,
            next: usize,
        }

        modified.put(self.id.clone(), value);
        let mut stack = vec![Frame {
            control: self,
            visible: modified.len(),
            next: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            let Some(&dependent) = frame.control.depending_autofill.get(frame.next) else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let visible = frame.visible;

            let control = &controls[dependent];
            if modified.has_value(&control.id) {
                continue;
            }
            let computed = control.compute_value(&OverlayValues {
                base: values,
                overlay: modified,
                visible,
            });
            modified.put(control.id.clone(), computed);
            stack.push(Frame {
                control,
                visible: modified.len(),
                next: 0,
            });
        }
    }

    /// False for layout-only elements, otherwise true iff every resolved group is visible.
    pub fn is_visible(&self, groups: &[VisibilityGroup]) -> bool {
        if !self.kind.can_be_visible() {
            return false;
        }
        self.groups.iter().all(|membership| match membership {
            GroupMembership::Resolved(index) => groups[*index].is_visible(),
            GroupMembership::Unresolved(_) => true,
        })
    }

    pub(crate) fn belongs_to(&self, group: usize) -> bool {
        self.groups
            .iter()
            .any(|membership| *membership == GroupMembership::Resolved(group))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combobox_defaults_to_first_option() {
        let control = Control::new(
            "choice",
            ControlType::Combobox,
            None,
            Rc::new(AlwaysTrue),
            vec!["a".into(), "b".into()],
        );
        assert_eq!(control.compute_value(&SimpleValues::new()), "a");
    }

    #[test]
    fn listbox_options_are_not_a_default() {
        let control = Control::new(
            "choice",
            ControlType::Listbox,
            None,
            Rc::new(AlwaysTrue),
            vec!["a".into()],
        );
        assert_eq!(control.compute_value(&SimpleValues::new()), "");
    }

    #[test]
    fn layout_elements_are_never_visible() {
        let glue = Control::new("g", ControlType::Glue, None, Rc::new(AlwaysTrue), vec![]);
        let label = Control::new("l", ControlType::Label, None, Rc::new(AlwaysTrue), vec![]);
        assert!(!glue.is_visible(&[]));
        assert!(label.is_visible(&[]));
    }

    #[test]
    fn broken_rules_fall_back_to_permissive_defaults() {
        let config = ControlConfig {
            plausi: Some(serde_json::json!({ "op": "nonsense" })),
            autofill: Some(serde_json::json!(42)),
            ..ControlConfig::new("field", ControlType::Textfield)
        };
        let control = Control::from_config(
            &config,
            &Rc::new(FunctionLibrary::new()),
            &Rc::new(DialogLibrary::new()),
        );
        assert!(control.autofill().is_none());
        assert!(control.plausi().get_boolean(&SimpleValues::new()));
    }
}
