use std::collections::HashMap;

/// Read-only view of field values handed to expressions.
pub trait Values {
    fn has_value(&self, id: &str) -> bool;

    /// Value of the field, or the empty string if there is none.
    fn get_string(&self, id: &str) -> String;

    fn get_boolean(&self, id: &str) -> bool {
        self.get_string(id) == "true"
    }
}

/// Insertion-ordered `id -> value` map.
///
/// Overwriting an existing id keeps its original position, so iteration order
/// is always the order in which ids were first inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleValues {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl SimpleValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: impl Into<String>, value: impl Into<String>) {
        let id = id.into();
        let value = value.into();
        match self.index.get(&id) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, value));
            }
        }
    }

    /// Overlays every entry of `other` onto this map.
    pub fn put_all(&mut self, other: &SimpleValues) {
        for (id, value) in other.iter() {
            self.put(id, value);
        }
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.index
            .get(id)
            .map(|&position| self.entries[position].1.as_str())
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(id, value)| (id.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Values for SimpleValues {
    fn has_value(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn get_string(&self, id: &str) -> String {
        self.get(id).unwrap_or_default().to_string()
    }
}

/// `base` overlaid with the first `visible` entries of `overlay`.
///
/// Entries added to `overlay` after the view was taken stay hidden, so a view
/// keeps reading what was known when it was created without copying `base`.
pub(crate) struct OverlayValues<'a> {
    pub base: &'a SimpleValues,
    pub overlay: &'a SimpleValues,
    pub visible: usize,
}

impl OverlayValues<'_> {
    fn overlaid(&self, id: &str) -> Option<&str> {
        match self.overlay.position(id) {
            Some(position) if position < self.visible => {
                Some(self.overlay.entries[position].1.as_str())
            }
            _ => None,
        }
    }
}

impl Values for OverlayValues<'_> {
    fn has_value(&self, id: &str) -> bool {
        self.overlaid(id).is_some() || self.base.has_value(id)
    }

    fn get_string(&self, id: &str) -> String {
        self.overlaid(id)
            .or_else(|| self.base.get(id))
            .unwrap_or_default()
            .to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SimpleValues {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut values = SimpleValues::new();
        for (id, value) in iter {
            values.put(id, value);
        }
        values
    }
}
