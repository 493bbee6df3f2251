use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Value, json};

use form_model::{
    DialogLibrary, EventLog, FormConfig, FormEvent, FormModel, FunctionLibrary, StaticDialog,
};

fn dialog_field(dialog: &str, data: &str) -> Value {
    json!({ "op": "dialog", "dialog": dialog, "data": data })
}

struct Fixture {
    model: FormModel,
    recipient: Rc<StaticDialog>,
    sender: Rc<StaticDialog>,
}

fn fixture(presets: &[(&str, &str)]) -> Fixture {
    let config: FormConfig = serde_json::from_value(json!({
        "title": "Letter",
        "functions": {
            "FullRecipient": {
                "op": "cat",
                "args": [
                    dialog_field("Recipient", "line1"),
                    { "op": "literal", "value": ", " },
                    dialog_field("Recipient", "line2")
                ]
            }
        },
        "tabs": [{
            "id": "address",
            "controls": [
                { "id": "Line1", "type": "textfield", "autofill": dialog_field("Recipient", "line1") },
                { "id": "Line2", "type": "textfield", "autofill": dialog_field("Recipient", "line2") },
                { "id": "Summary", "type": "textarea", "autofill": { "op": "call", "function": "FullRecipient" } },
                { "id": "Signed", "type": "textfield", "autofill": dialog_field("Sender", "name") },
                {
                    "id": "Greeting",
                    "type": "textfield",
                    "autofill": {
                        "op": "cat",
                        "args": [{ "op": "literal", "value": "Dear " }, { "op": "value", "id": "Line1" }]
                    }
                }
            ]
        }]
    }))
    .expect("deserialize config");

    let recipient = Rc::new(StaticDialog::new());
    let sender = Rc::new(StaticDialog::with_data([("name", "Alice")]));
    let mut dialogs = DialogLibrary::new();
    dialogs.add("Recipient", recipient.clone());
    dialogs.add("Sender", sender.clone());

    let presets: HashMap<String, String> = presets
        .iter()
        .map(|(id, value)| (id.to_string(), value.to_string()))
        .collect();
    let model = FormModel::new(
        &config,
        Rc::new(FunctionLibrary::from_config(&config.functions)),
        Rc::new(dialogs),
        &presets,
    );
    Fixture {
        model,
        recipient,
        sender,
    }
}

fn changed_ids(log: &EventLog) -> Vec<String> {
    log.events()
        .into_iter()
        .filter_map(|event| match event {
            FormEvent::ValueChanged { id, .. } => Some(id),
            _ => None,
        })
        .collect()
}

#[test]
fn dialog_dependencies_are_indexed_through_function_calls() {
    let Fixture { model, .. } = fixture(&[]);
    assert_eq!(
        model.dialog_dependents("Recipient"),
        vec!["Line1", "Line2", "Summary"]
    );
    assert_eq!(model.dialog_dependents("Sender"), vec!["Signed"]);
    assert!(model.dialog_dependents("Other").is_empty());
    assert_eq!(model.get_value("Signed").unwrap(), "Alice");
}

#[test]
fn dialog_autofill_touches_only_that_dialogs_dependents() {
    let Fixture {
        mut model,
        recipient,
        sender,
    } = fixture(&[]);
    let log = Rc::new(EventLog::new());
    model.add_value_listener(log.clone(), false);

    recipient.replace([("line1", "Jane Doe"), ("line2", "Main St 1")]);
    sender.set("name", "Bob");
    model.set_dialog_autofills("Recipient");

    assert_eq!(model.get_value("Line1").unwrap(), "Jane Doe");
    assert_eq!(model.get_value("Line2").unwrap(), "Main St 1");
    assert_eq!(model.get_value("Summary").unwrap(), "Jane Doe, Main St 1");
    assert_eq!(model.get_value("Greeting").unwrap(), "Dear Jane Doe");
    assert_eq!(model.get_value("Signed").unwrap(), "Alice");
    assert_eq!(
        changed_ids(&log),
        vec!["Line1", "Greeting", "Line2", "Summary"]
    );
}

#[test]
fn dialog_results_override_presets() {
    let Fixture {
        mut model,
        recipient,
        ..
    } = fixture(&[("Line1", "stored"), ("Line2", "stored too")]);
    assert_eq!(model.get_value("Line1").unwrap(), "stored");

    recipient.replace([("line1", "fresh")]);
    model.set_dialog_autofills("Recipient");
    assert_eq!(model.get_value("Line1").unwrap(), "fresh");
    assert_eq!(model.get_value("Line2").unwrap(), "");
}

#[test]
fn unknown_dialog_is_a_no_op() {
    let Fixture { mut model, .. } = fixture(&[]);
    let log = Rc::new(EventLog::new());
    model.add_value_listener(log.clone(), false);
    model.set_dialog_autofills("Nobody");
    assert!(log.is_empty());
}
