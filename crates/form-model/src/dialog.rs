use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// An interactive dialog whose results expressions can read.
pub trait Dialog {
    /// Value of one data field, or `None` if the dialog has not produced it.
    fn data(&self, field: &str) -> Option<String>;
}

/// In-memory dialog whose data is replaced whenever the real dialog completes.
#[derive(Debug, Default)]
pub struct StaticDialog {
    data: RefCell<BTreeMap<String, String>>,
}

impl StaticDialog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data<K, V>(data: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let dialog = Self::new();
        dialog.replace(data);
        dialog
    }

    pub fn set(&self, field: impl Into<String>, value: impl Into<String>) {
        self.data.borrow_mut().insert(field.into(), value.into());
    }

    pub fn replace<K, V>(&self, data: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        *self.data.borrow_mut() = data
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect();
    }
}

impl Dialog for StaticDialog {
    fn data(&self, field: &str) -> Option<String> {
        self.data.borrow().get(field).cloned()
    }
}

/// Dialogs available to expressions, by name.
#[derive(Default)]
pub struct DialogLibrary {
    dialogs: BTreeMap<String, Rc<dyn Dialog>>,
}

impl DialogLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, dialog: Rc<dyn Dialog>) {
        self.dialogs.insert(name.into(), dialog);
    }

    pub fn get(&self, name: &str) -> Option<&Rc<dyn Dialog>> {
        self.dialogs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dialogs.contains_key(name)
    }
}

impl fmt::Debug for DialogLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.dialogs.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_drops_previous_data() {
        let dialog = StaticDialog::with_data([("street", "Main St")]);
        dialog.replace([("city", "Springfield")]);
        assert_eq!(dialog.data("street"), None);
        assert_eq!(dialog.data("city").as_deref(), Some("Springfield"));
    }
}
