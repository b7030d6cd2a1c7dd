//! Accumulated, non-fatal validation errors.

use std::collections::BTreeMap;

/// Validation messages keyed by field.
///
/// Dependency fields are keyed `"<component>.<field>"`; host fields use
/// the bare attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    entries: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Records a message for a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.entries
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Merges another error set, prefixing each field with `scope.`.
    pub fn merge_scoped(&mut self, scope: &str, other: Self) {
        for (field, messages) in other.entries {
            let key = format!("{scope}.{field}");
            self.entries.entry(key).or_default().extend(messages);
        }
    }

    /// Merges another error set without changing its keys.
    pub fn merge(&mut self, other: Self) {
        for (field, messages) in other.entries {
            self.entries.entry(field).or_default().extend(messages);
        }
    }

    /// Messages recorded for a field, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries.get(field).map(Vec::as_slice)
    }

    /// Whether no errors were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of fields with at least one error.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates `(field, messages)` in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Flattens into `"<field> <message>"` strings.
    #[must_use]
    pub fn full_messages(&self) -> Vec<String> {
        self.iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| format!("{field} {m}")))
            .collect()
    }
}
