//! Typed attribute store with defaults and change tracking.
//!
//! The store only knows which names are declared; it does not coerce
//! values. Hosts wrap it with their own setters so that writes can run a
//! cast hook and trigger propagation.

use std::collections::BTreeSet;

use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};

use crate::attribute::ConfigAttr;

/// Declared attributes of one owner and their current values.
#[derive(Debug, Clone)]
pub struct AttributeStore {
    owner: String,
    declared: BTreeSet<String>,
    values: AttributeMap,
    changed: BTreeSet<String>,
}

impl AttributeStore {
    /// Creates a store for `schema`, seeding each attribute with its
    /// default.
    #[must_use]
    pub fn new(owner: impl Into<String>, schema: &[ConfigAttr]) -> Self {
        let mut store = Self {
            owner: owner.into(),
            declared: BTreeSet::new(),
            values: AttributeMap::new(),
            changed: BTreeSet::new(),
        };
        for attr in schema {
            let _ = store.declared.insert(attr.name().to_owned());
            let default = attr.default();
            if default != AttrValue::Null {
                let _ = store.values.insert(attr.name().to_owned(), default);
            }
        }
        store
    }

    /// Creates a store for plain field names without defaults.
    #[must_use]
    pub fn with_fields(owner: impl Into<String>, fields: &[&str]) -> Self {
        let schema: Vec<ConfigAttr> = fields.iter().map(|f| ConfigAttr::new(*f)).collect();
        Self::new(owner, &schema)
    }

    /// Name of the host or component owning the store.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether `name` is a declared attribute.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.declared.contains(name)
    }

    /// Current value of a declared attribute; `None` when unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    /// Writes a declared attribute, recording a change when the value
    /// differs. Writing null unsets the attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is not declared.
    pub fn set(&mut self, name: &str, value: AttrValue) -> Result<bool> {
        if !self.declares(name) {
            return Err(RiggingError::UnknownAttribute {
                owner: self.owner.clone(),
                name: name.to_owned(),
            });
        }
        if self.values.get(name).unwrap_or(&AttrValue::Null) == &value {
            return Ok(false);
        }
        if value == AttrValue::Null {
            let _ = self.values.remove(name);
        } else {
            let _ = self.values.insert(name.to_owned(), value);
        }
        let _ = self.changed.insert(name.to_owned());
        Ok(true)
    }

    /// Declared attribute names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    /// Set attributes and their values, in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Snapshot of every set attribute.
    #[must_use]
    pub fn to_map(&self) -> AttributeMap {
        self.values.clone()
    }

    /// Attributes changed since the last [`AttributeStore::clear_changes`].
    pub fn changes(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    /// Whether `name` changed since the last clear.
    #[must_use]
    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    /// Forgets recorded changes.
    pub fn clear_changes(&mut self) {
        self.changed.clear();
    }
}
