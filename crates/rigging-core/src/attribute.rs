//! Bound-attribute descriptors.
//!
//! A [`ConfigAttr`] describes one attribute an option binds: its default,
//! whether it is required, which parent attribute feeds it, and how the
//! fed value is transformed. Descriptors are immutable once a definition is
//! built and are shared by every instance built from that definition.

use std::fmt;
use std::rc::Rc;

use rigging_common::value::AttrValue;

use crate::store::AttributeStore;

/// Transform applied to a sourced value, with the parent store as context.
pub type Transform = Rc<dyn Fn(AttrValue, &AttributeStore) -> AttrValue>;

/// Default of a bound attribute: a value, or a thunk evaluated on use.
#[derive(Clone)]
pub enum AttrDefault {
    /// Fixed value.
    Value(AttrValue),
    /// Deferred value, evaluated every time the default is needed.
    Thunk(Rc<dyn Fn() -> AttrValue>),
}

impl AttrDefault {
    /// Produces the default value.
    #[must_use]
    pub fn evaluate(&self) -> AttrValue {
        match self {
            Self::Value(v) => v.clone(),
            Self::Thunk(f) => f(),
        }
    }
}

impl fmt::Debug for AttrDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

/// Descriptor of one bound attribute.
#[derive(Clone)]
pub struct ConfigAttr {
    name: String,
    default: Option<AttrDefault>,
    required: bool,
    source: Option<String>,
    transform: Option<Transform>,
}

impl ConfigAttr {
    /// Creates a descriptor with no default, no source, and no transform.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            required: false,
            source: None,
            transform: None,
        }
    }

    /// Sets a fixed default.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<AttrValue>) -> Self {
        self.default = Some(AttrDefault::Value(value.into()));
        self
    }

    /// Sets a default computed each time it is needed.
    #[must_use]
    pub fn default_with(mut self, thunk: impl Fn() -> AttrValue + 'static) -> Self {
        self.default = Some(AttrDefault::Thunk(Rc::new(thunk)));
        self
    }

    /// Marks the attribute as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Reads the value from the parent attribute `name` instead of the
    /// identically-named one.
    #[must_use]
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }

    /// Sets the transform applied to sourced values.
    #[must_use]
    pub fn transform(mut self, f: impl Fn(AttrValue, &AttributeStore) -> AttrValue + 'static) -> Self {
        self.transform = Some(Rc::new(f));
        self
    }

    /// Attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent attribute feeding this one, if any.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the attribute is required.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Evaluated default, or null when none is declared.
    #[must_use]
    pub fn default(&self) -> AttrValue {
        self.default.as_ref().map_or(AttrValue::Null, AttrDefault::evaluate)
    }

    /// Resolves a raw value: substitutes the default when the value is
    /// absent, then applies the transform to whatever is present.
    #[must_use]
    pub fn resolve(&self, raw: Option<AttrValue>, context: &AttributeStore) -> Option<AttrValue> {
        let value = match raw {
            Some(v) if v != AttrValue::Null => v,
            _ => self.default(),
        };
        if value == AttrValue::Null {
            return None;
        }
        Some(self.apply_transform(value, context))
    }

    /// Applies the transform, or returns the value unchanged without one.
    #[must_use]
    pub fn apply_transform(&self, value: AttrValue, context: &AttributeStore) -> AttrValue {
        match &self.transform {
            Some(f) => f(value, context),
            None => value,
        }
    }

    /// Parent attribute this descriptor reads from in `parent`: the source
    /// when the parent declares it, else the own name when declared.
    #[must_use]
    pub fn parent_attribute<'a>(&'a self, parent: &AttributeStore) -> Option<&'a str> {
        if let Some(source) = self.source.as_deref() {
            if parent.declares(source) {
                return Some(source);
            }
        }
        parent.declares(&self.name).then_some(self.name.as_str())
    }

    /// Reads the value this descriptor takes from `parent`, if the parent
    /// exposes one.
    #[must_use]
    pub fn read_parent(&self, parent: &AttributeStore) -> Option<AttrValue> {
        self.parent_attribute(parent)
            .and_then(|name| parent.get(name).cloned())
    }
}

impl fmt::Debug for ConfigAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigAttr")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("required", &self.required)
            .field("source", &self.source)
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .finish()
    }
}
