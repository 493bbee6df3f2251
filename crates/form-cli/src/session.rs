use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write};
use std::rc::Rc;

use form_model::{
    DialogLibrary, EventLog, FormConfig, FormEvent, FormModel, FormSnapshot, FunctionLibrary,
    StaticDialog,
};
use tracing::debug;

/// A form model together with the in-memory dialogs that feed it.
pub struct Session {
    model: FormModel,
    dialogs: BTreeMap<String, Rc<StaticDialog>>,
    log: Rc<EventLog>,
}

impl Session {
    /// Opens the form, registering an empty dialog for every dialog name the
    /// config references so that dialog expressions compile.
    pub fn open(config: &FormConfig, presets: &HashMap<String, String>) -> Self {
        let mut library = DialogLibrary::new();
        let mut dialogs = BTreeMap::new();
        for name in config.referenced_dialogs() {
            let dialog = Rc::new(StaticDialog::new());
            library.add(name.clone(), dialog.clone());
            dialogs.insert(name, dialog);
        }
        debug!(dialogs = dialogs.len(), "opening form session");

        let mut model = FormModel::new(
            config,
            Rc::new(FunctionLibrary::from_config(&config.functions)),
            Rc::new(library),
            presets,
        );
        let log = Rc::new(EventLog::new());
        model.add_value_listener(log.clone(), false);
        model.add_visibility_listener(log.clone(), false);
        Self {
            model,
            dialogs,
            log,
        }
    }

    pub fn model(&self) -> &FormModel {
        &self.model
    }

    pub fn snapshot(&self) -> FormSnapshot {
        self.model.snapshot()
    }

    /// Applies a field edit and returns the notifications it caused.
    pub fn set(&mut self, id: &str, value: &str) -> Result<Vec<FormEvent>, InputError> {
        if !self.model.has_field_id(id) {
            return Err(InputError::new(format!("unknown field '{}'", id)));
        }
        self.model.set_value(id, value);
        Ok(self.log.take())
    }

    /// Stores new dialog results and re-runs the AUTOFILLs reading them.
    pub fn complete_dialog(
        &mut self,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<Vec<FormEvent>, InputError> {
        let dialog = self
            .dialogs
            .get(name)
            .ok_or_else(|| InputError::new(format!("form does not use dialog '{}'", name)))?;
        dialog.replace(data.iter().map(|(field, value)| (field.clone(), value.clone())));
        self.model.set_dialog_autofills(name);
        Ok(self.log.take())
    }
}

/// One line typed into an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Set { id: String, value: String },
    Dialog {
        name: String,
        data: BTreeMap<String, String>,
    },
    State,
    Quit,
}

/// Input the session could not act on, worded for the person typing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError {
    pub user_message: String,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message)
    }
}

impl std::error::Error for InputError {}

impl InputError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
        }
    }
}

pub fn parse_command(line: &str) -> Result<SessionCommand, InputError> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix(':') {
        let mut words = rest.split_whitespace();
        return match words.next() {
            Some("quit") | Some("q") => Ok(SessionCommand::Quit),
            Some("state") => Ok(SessionCommand::State),
            Some("dialog") => {
                let name = words
                    .next()
                    .ok_or_else(|| InputError::new(":dialog needs a dialog name"))?;
                let data = words
                    .map(|pair| {
                        pair.split_once('=')
                            .map(|(field, value)| (field.to_string(), value.to_string()))
                            .ok_or_else(|| {
                                InputError::new(format!("expected field=value, got '{}'", pair))
                            })
                    })
                    .collect::<Result<BTreeMap<_, _>, _>>()?;
                Ok(SessionCommand::Dialog {
                    name: name.to_string(),
                    data,
                })
            }
            Some(other) => Err(InputError::new(format!("unknown command ':{}'", other))),
            None => Err(InputError::new("empty command")),
        };
    }
    match line.split_once('=') {
        Some((id, value)) if !id.trim().is_empty() => Ok(SessionCommand::Set {
            id: id.trim().to_string(),
            value: value.to_string(),
        }),
        _ => Err(InputError::new("expected id=value or a :command")),
    }
}

/// Prints notifications and form state for a human reader.
pub struct SessionPresenter {
    verbose: bool,
}

impl SessionPresenter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn show_events(&self, events: &[FormEvent]) {
        if events.is_empty() && self.verbose {
            println!("(no changes)");
        }
        for event in events {
            println!("{}", describe_event(event));
        }
    }

    pub fn show_input_error(&self, error: &InputError) {
        eprintln!("Invalid input: {}", error.user_message);
    }

    pub fn show_state(&self, title: &str, snapshot: &FormSnapshot) {
        print!("{}", render_state(title, snapshot, self.verbose));
    }
}

pub fn describe_event(event: &FormEvent) -> String {
    match event {
        FormEvent::ValueChanged { id, value } => format!("value  {} = {:?}", id, value),
        FormEvent::StatusChanged { id, okay } => {
            format!("status {} {}", id, if *okay { "ok" } else { "invalid" })
        }
        FormEvent::VisibilityChanged { group_id, visible } => format!(
            "group  {} {}",
            group_id,
            if *visible { "shown" } else { "hidden" }
        ),
    }
}

/// Text listing of every control; layout elements only appear in verbose mode.
pub fn render_state(title: &str, snapshot: &FormSnapshot, verbose: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Form: {}", title);
    for control in &snapshot.controls {
        if !verbose && !control.kind.is_value_bearing() {
            continue;
        }
        let mut line = format!(" - {} ({}) = {:?}", control.id, control.kind.as_str(), control.value);
        if !control.okay {
            line.push_str(" [invalid]");
        }
        if !control.visible {
            line.push_str(" [hidden]");
        }
        let _ = writeln!(out, "{}", line);
    }
    if !snapshot.groups.is_empty() {
        let _ = writeln!(out, "Groups:");
        for group in &snapshot.groups {
            let _ = writeln!(
                out,
                " - {} {}",
                group.id,
                if group.visible { "shown" } else { "hidden" }
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_set_keeps_value_verbatim() {
        assert_eq!(
            parse_command("name= Jane = Doe").unwrap(),
            SessionCommand::Set {
                id: "name".into(),
                value: " Jane = Doe".into()
            }
        );
    }

    #[test]
    fn parse_dialog_collects_pairs() {
        let command = parse_command(":dialog Recipient line1=Jane line2=Main").unwrap();
        let SessionCommand::Dialog { name, data } = command else {
            panic!("expected dialog command");
        };
        assert_eq!(name, "Recipient");
        assert_eq!(data.get("line2").map(String::as_str), Some("Main"));
        assert!(parse_command(":dialog Recipient broken").is_err());
        assert!(parse_command(":dialog").is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_command("no equals sign").is_err());
        assert!(parse_command(":frobnicate").is_err());
        assert_eq!(parse_command(":q").unwrap(), SessionCommand::Quit);
    }

    #[test]
    fn session_reports_dialog_driven_changes() {
        let config: FormConfig = serde_json::from_value(json!({
            "title": "Letter",
            "tabs": [{
                "controls": [
                    { "id": "to", "type": "textfield", "autofill": { "op": "dialog", "dialog": "Recipient", "data": "name" } }
                ]
            }]
        }))
        .unwrap();
        let mut session = Session::open(&config, &HashMap::new());
        let data = BTreeMap::from([("name".to_string(), "Jane".to_string())]);
        let events = session.complete_dialog("Recipient", &data).unwrap();
        assert_eq!(
            events[0],
            FormEvent::ValueChanged {
                id: "to".into(),
                value: "Jane".into()
            }
        );
        let err = session.complete_dialog("Other", &data).unwrap_err();
        assert!(err.user_message.contains("Other"));
        let err = session.set("nope", "x").unwrap_err();
        assert_eq!(err.to_string(), "unknown field 'nope'");
    }
}
