//! Runtime surface of dependency instances.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rigging_common::error::Result;
use rigging_common::validation::ValidationErrors;
use rigging_common::value::{AttrValue, AttributeMap};

use crate::store::AttributeStore;

/// An instance a dependency slot can hold.
///
/// `class_name` is the discriminant tag: it must equal the identifier of
/// the [`ComponentClass`](crate::class::ComponentClass) that builds the
/// instance, and it is how injected and live instances are matched back to
/// their option.
pub trait Component: fmt::Debug {
    /// Identifier of the class this instance belongs to.
    fn class_name(&self) -> &str;

    /// Plain attribute dump.
    fn attributes(&self) -> AttributeMap;

    /// Reads one attribute.
    fn read_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes().get(name).cloned()
    }

    /// Writes one attribute. Returns `Ok(false)` when the component has no
    /// writer for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the component rejects the value.
    fn write_attribute(&mut self, name: &str, value: AttrValue) -> Result<bool>;

    /// Custom serialization; `None` falls back to the attribute dump.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested dependency cannot be serialized.
    fn serialize(&self) -> Result<Option<AttrValue>> {
        Ok(None)
    }

    /// Component-level validation, keyed by field name.
    fn validate(&self) -> ValidationErrors {
        ValidationErrors::default()
    }
}

/// Shared, mutable handle to a component.
pub type SharedComponent = Rc<RefCell<dyn Component>>;

/// Wraps a component into a shared handle.
pub fn shared<C: Component + 'static>(component: C) -> SharedComponent {
    Rc::new(RefCell::new(component))
}

/// A component that stores a fixed set of named fields.
#[derive(Debug, Clone)]
pub struct PlainComponent {
    store: AttributeStore,
}

impl PlainComponent {
    /// Creates an instance of `class` with `fields`, assigning `args`.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument names an undeclared field.
    pub fn new(class: &str, fields: &[&str], args: AttributeMap) -> Result<Self> {
        let mut store = AttributeStore::with_fields(class, fields);
        for (name, value) in args {
            let _ = store.set(&name, value)?;
        }
        store.clear_changes();
        Ok(Self { store })
    }

    /// Current value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.store.get(name)
    }
}

impl Component for PlainComponent {
    fn class_name(&self) -> &str {
        self.store.owner()
    }

    fn attributes(&self) -> AttributeMap {
        self.store.to_map()
    }

    fn read_attribute(&self, name: &str) -> Option<AttrValue> {
        self.store.get(name).cloned()
    }

    fn write_attribute(&mut self, name: &str, value: AttrValue) -> Result<bool> {
        if !self.store.declares(name) {
            return Ok(false);
        }
        let _ = self.store.set(name, value)?;
        Ok(true)
    }
}
