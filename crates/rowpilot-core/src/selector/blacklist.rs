use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An (element, attribute, value) triple that previously failed to locate
/// its element and must not be proposed again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub element: String,
    pub attribute: String,
    pub value: String,
}

impl BlacklistEntry {
    pub fn new(
        element: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            element: element.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for BlacklistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.element, self.attribute, self.value)
    }
}

/// Session-scoped set of failed locator components.
///
/// Owned by whoever drives healing and passed by reference into selector
/// generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blacklist {
    entries: BTreeSet<BlacklistEntry>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the entry was already present.
    pub fn insert(&mut self, entry: BlacklistEntry) -> bool {
        self.entries.insert(entry)
    }

    pub fn contains(&self, element: &str, attribute: &str, value: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.element == element && e.attribute == attribute && e.value == value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlacklistEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Extend<BlacklistEntry> for Blacklist {
    fn extend<T: IntoIterator<Item = BlacklistEntry>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}
