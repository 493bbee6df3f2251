use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::config::FormConfig;
use crate::control::{Control, GroupMembership};
use crate::dialog::DialogLibrary;
use crate::error::FormModelError;
use crate::expr::Expr;
use crate::function::{AlwaysTrue, FunctionLibrary};
use crate::listener::{FormValueChangedListener, VisibilityChangedListener};
use crate::snapshot::{ControlState, FormSnapshot, GroupState};
use crate::values::SimpleValues;
use crate::visibility::VisibilityGroup;

/// Values, validity and visibility of one open form.
///
/// The model is driven by [`FormModel::set_value`] and
/// [`FormModel::set_dialog_autofills`]; every change is pushed to the
/// registered listeners before the call returns.
pub struct FormModel {
    functions: Rc<FunctionLibrary>,
    dialogs: Rc<DialogLibrary>,
    groups: Vec<VisibilityGroup>,
    group_index: HashMap<String, usize>,
    controls: Vec<Control>,
    control_index: HashMap<String, usize>,
    dialog_dependencies: HashMap<String, Vec<usize>>,
    value_listeners: Vec<Rc<dyn FormValueChangedListener>>,
    visibility_listeners: Vec<Rc<dyn VisibilityChangedListener>>,
}

impl FormModel {
    /// Builds the model and computes initial values, validity and visibility.
    ///
    /// `presets` holds values persisted by an earlier session; they take
    /// priority over AUTOFILL defaults.
    pub fn new(
        config: &FormConfig,
        functions: Rc<FunctionLibrary>,
        dialogs: Rc<DialogLibrary>,
        presets: &HashMap<String, String>,
    ) -> Self {
        let mut model = Self {
            functions,
            dialogs,
            groups: Vec::new(),
            group_index: HashMap::new(),
            controls: Vec::new(),
            control_index: HashMap::new(),
            dialog_dependencies: HashMap::new(),
            value_listeners: Vec::new(),
            visibility_listeners: Vec::new(),
        };

        for group_config in &config.visibilities {
            let condition =
                Expr::compile_value(&group_config.condition, &model.functions, &model.dialogs)
                    .unwrap_or_else(|err| {
                        warn!(group = %group_config.id, error = %err, "ignoring broken visibility condition");
                        Rc::new(AlwaysTrue)
                    });
            model.add_group(VisibilityGroup::new(group_config.id.clone(), condition));
        }

        for control_config in config.all_controls() {
            let mut control = Control::from_config(control_config, &model.functions, &model.dialogs);
            for group_id in &control_config.groups {
                let membership = match model.group_index.get(group_id) {
                    Some(&index) => GroupMembership::Resolved(index),
                    None => {
                        warn!(control = %control_config.id, group = %group_id, "unknown visibility group");
                        GroupMembership::Unresolved(group_id.clone())
                    }
                };
                control.add_group(membership);
            }
            model.add_form_field(control);
        }

        for index in 0..model.controls.len() {
            model.store_deps(index);
            model.store_autofill_dialog_deps(index);
        }

        model.init_controls(presets);
        model
    }

    fn add_group(&mut self, group: VisibilityGroup) {
        if self.group_index.contains_key(group.group_id()) {
            debug!(group = %group.group_id(), "visibility group declared again, keeping the first");
            return;
        }
        self.group_index
            .insert(group.group_id().to_string(), self.groups.len());
        self.groups.push(group);
    }

    fn add_form_field(&mut self, control: Control) {
        match self.control_index.get(control.id()) {
            Some(&index) => {
                error!(control = %control.id(), "id declared more than once");
                self.controls[index] = control;
            }
            None => {
                self.control_index
                    .insert(control.id().to_string(), self.controls.len());
                self.controls.push(control);
            }
        }
    }

    /// Registers `index` as dependent of every field its AUTOFILL and PLAUSI read.
    fn store_deps(&mut self, index: usize) {
        let control = &self.controls[index];
        let id = control.id().to_string();
        let autofill_params = control
            .autofill()
            .map(|autofill| autofill.parameters())
            .unwrap_or_default();
        let plausi_params = control.plausi().parameters();

        for param in autofill_params {
            match self.control_index.get(&param) {
                Some(&source) => self.controls[source].depending_autofill.push(index),
                None => warn!(control = %id, reference = %param, "AUTOFILL references unknown field"),
            }
        }
        for param in plausi_params {
            match self.control_index.get(&param) {
                Some(&source) => self.controls[source].depending_plausi.push(index),
                None => warn!(control = %id, reference = %param, "PLAUSI references unknown field"),
            }
        }
        self.controls[index].depending_plausi.push(index);
    }

    fn store_autofill_dialog_deps(&mut self, index: usize) {
        let mut dialog_names = BTreeSet::new();
        if let Some(autofill) = self.controls[index].autofill() {
            autofill.function_dialog_references(&mut dialog_names);
        }
        for name in dialog_names {
            self.dialog_dependencies.entry(name).or_default().push(index);
        }
    }

    fn init_controls(&mut self, presets: &HashMap<String, String>) {
        let mut values = self.id_to_value();
        for control in &mut self.controls {
            let value = match presets.get(control.id()) {
                Some(preset) => preset.clone(),
                None => control.compute_value(&values),
            };
            if value != control.value() {
                values.put(control.id(), value.clone());
                control.set_value(value);
            }
        }

        for control in &mut self.controls {
            control.set_okay(&values);
        }

        for group in 0..self.groups.len() {
            self.store_deps_for_visibility(group, &values);
        }
    }

    fn store_deps_for_visibility(&mut self, group: usize, values: &SimpleValues) {
        for param in self.groups[group].condition().parameters() {
            match self.control_index.get(&param) {
                Some(&index) => self.controls[index].add_depending_group(group),
                None => warn!(
                    group = %self.groups[group].group_id(),
                    reference = %param,
                    "visibility condition references unknown field"
                ),
            }
        }
        self.groups[group].compute_visibility(values);
    }

    /// Sets the value of a control and recomputes everything that depends on it.
    ///
    /// Unknown ids and unchanged values are ignored without notifying anyone.
    pub fn set_value(&mut self, id: &str, value: &str) {
        let Some(&index) = self.control_index.get(id) else {
            debug!(control = %id, "ignoring value for unknown field");
            return;
        };
        if self.controls[index].value() == value {
            return;
        }

        let current = self.id_to_value();
        let mut modified = SimpleValues::new();
        self.controls[index].compute_new_values(
            &self.controls,
            value.to_string(),
            &current,
            &mut modified,
        );
        let mut new_values = current;
        new_values.put_all(&modified);
        debug!(control = %id, changed = modified.len(), "propagating value change");

        let mut modified_groups: Vec<usize> = Vec::new();
        for (changed_id, changed_value) in modified.iter() {
            let Some(&changed) = self.control_index.get(changed_id) else {
                continue;
            };
            let control = &mut self.controls[changed];
            control.set_value(changed_value.to_string());
            control.set_okay(&new_values);
            for listener in &self.value_listeners {
                listener.value_changed(control.id(), control.value());
                listener.status_changed(control.id(), control.is_okay());
            }
            for &group in &control.depending_groups {
                if !modified_groups.contains(&group) {
                    modified_groups.push(group);
                }
            }
        }

        for &group in &modified_groups {
            self.groups[group].compute_visibility(&new_values);
        }
        for listener in &self.visibility_listeners {
            for &group in &modified_groups {
                let group = &self.groups[group];
                listener.visibility_changed(group.group_id(), group.is_visible());
            }
        }
    }

    /// Re-runs the AUTOFILL of every control that reads from `dialog_name`.
    pub fn set_dialog_autofills(&mut self, dialog_name: &str) {
        let Some(dependents) = self.dialog_dependencies.get(dialog_name).cloned() else {
            debug!(dialog = %dialog_name, "no AUTOFILL depends on dialog");
            return;
        };
        for index in dependents {
            let control = &self.controls[index];
            if let Some(autofill) = control.autofill() {
                let value = autofill.get_string(&self.id_to_value());
                let id = control.id().to_string();
                self.set_value(&id, &value);
            }
        }
    }

    pub fn get_value(&self, id: &str) -> Result<&str, FormModelError> {
        self.lookup(id).map(Control::value)
    }

    pub fn get_status(&self, id: &str) -> Result<bool, FormModelError> {
        self.lookup(id).map(Control::is_okay)
    }

    pub fn is_visible(&self, id: &str) -> Result<bool, FormModelError> {
        self.lookup(id)
            .map(|control| control.is_visible(&self.groups))
    }

    fn lookup(&self, id: &str) -> Result<&Control, FormModelError> {
        self.control(id)
            .ok_or_else(|| FormModelError::UnknownField(id.to_string()))
    }

    pub fn has_field_id(&self, id: &str) -> bool {
        self.control_index.contains_key(id)
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.control_index
            .get(id)
            .map(|&index| &self.controls[index])
    }

    pub fn group(&self, group_id: &str) -> Option<&VisibilityGroup> {
        self.group_index
            .get(group_id)
            .map(|&index| &self.groups[index])
    }

    /// Controls in declaration order.
    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn groups(&self) -> impl Iterator<Item = &VisibilityGroup> {
        self.groups.iter()
    }

    /// Visibility groups of a control, as resolved when the model was built.
    pub fn groups_of(&self, id: &str) -> Result<Vec<&VisibilityGroup>, FormModelError> {
        let control = self.lookup(id)?;
        Ok(control
            .memberships()
            .iter()
            .filter_map(|membership| match membership {
                GroupMembership::Resolved(index) => Some(&self.groups[*index]),
                GroupMembership::Unresolved(_) => None,
            })
            .collect())
    }

    pub fn controls_by_group_id(&self, group_id: &str) -> Vec<&Control> {
        let Some(&group) = self.group_index.get(group_id) else {
            return Vec::new();
        };
        self.controls
            .iter()
            .filter(|control| control.belongs_to(group))
            .collect()
    }

    /// Ids of the controls whose AUTOFILL reads from `dialog_name`.
    pub fn dialog_dependents(&self, dialog_name: &str) -> Vec<&str> {
        self.dialog_dependencies
            .get(dialog_name)
            .map(|indices| indices.iter().map(|&i| self.controls[i].id()).collect())
            .unwrap_or_default()
    }

    /// Ids of the controls whose PLAUSI reads `id`, the control itself included.
    pub fn plausi_dependents(&self, id: &str) -> Result<Vec<&str>, FormModelError> {
        let control = self.lookup(id)?;
        Ok(control
            .depending_plausi
            .iter()
            .map(|&i| self.controls[i].id())
            .collect())
    }

    fn id_to_value(&self) -> SimpleValues {
        self.controls
            .iter()
            .map(|control| (control.id(), control.value()))
            .collect()
    }

    /// Registers a value listener, optionally replaying the current state to it first.
    pub fn add_value_listener(
        &mut self,
        listener: Rc<dyn FormValueChangedListener>,
        notify_current: bool,
    ) {
        if notify_current {
            self.notify_with_current_values(listener.as_ref());
        }
        self.value_listeners.push(listener);
    }

    /// Registers a visibility listener, optionally replaying the current state to it first.
    pub fn add_visibility_listener(
        &mut self,
        listener: Rc<dyn VisibilityChangedListener>,
        notify_current: bool,
    ) {
        if notify_current {
            self.notify_with_current_visibilities(listener.as_ref());
        }
        self.visibility_listeners.push(listener);
    }

    /// Sends value and status of every value-bearing control to `listener`.
    pub fn notify_with_current_values(&self, listener: &dyn FormValueChangedListener) {
        for control in self
            .controls
            .iter()
            .filter(|control| control.kind().is_value_bearing())
        {
            listener.value_changed(control.id(), control.value());
            listener.status_changed(control.id(), control.is_okay());
        }
    }

    pub fn notify_with_current_visibilities(&self, listener: &dyn VisibilityChangedListener) {
        for group in &self.groups {
            listener.visibility_changed(group.group_id(), group.is_visible());
        }
    }

    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            controls: self
                .controls
                .iter()
                .map(|control| ControlState {
                    id: control.id().to_string(),
                    kind: control.kind(),
                    value: control.value().to_string(),
                    okay: control.is_okay(),
                    visible: control.is_visible(&self.groups),
                })
                .collect(),
            groups: self
                .groups
                .iter()
                .map(|group| GroupState {
                    id: group.group_id().to_string(),
                    visible: group.is_visible(),
                })
                .collect(),
        }
    }
}
