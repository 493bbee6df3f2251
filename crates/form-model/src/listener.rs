use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Receives value and validity changes of controls.
pub trait FormValueChangedListener {
    fn value_changed(&self, id: &str, value: &str);
    fn status_changed(&self, id: &str, okay: bool);
}

/// Receives recomputed visibility of groups.
pub trait VisibilityChangedListener {
    fn visibility_changed(&self, group_id: &str, visible: bool);
}

/// A single notification emitted by a form model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FormEvent {
    ValueChanged { id: String, value: String },
    StatusChanged { id: String, okay: bool },
    VisibilityChanged { group_id: String, visible: bool },
}

/// Listener that records every notification in arrival order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RefCell<Vec<FormEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FormEvent> {
        self.events.borrow().clone()
    }

    /// Returns the recorded events and starts over with an empty log.
    pub fn take(&self) -> Vec<FormEvent> {
        self.events.take()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl FormValueChangedListener for EventLog {
    fn value_changed(&self, id: &str, value: &str) {
        self.events.borrow_mut().push(FormEvent::ValueChanged {
            id: id.to_string(),
            value: value.to_string(),
        });
    }

    fn status_changed(&self, id: &str, okay: bool) {
        self.events.borrow_mut().push(FormEvent::StatusChanged {
            id: id.to_string(),
            okay,
        });
    }
}

impl VisibilityChangedListener for EventLog {
    fn visibility_changed(&self, group_id: &str, visible: bool) {
        self.events.borrow_mut().push(FormEvent::VisibilityChanged {
            group_id: group_id.to_string(),
            visible,
        });
    }
}
