//! Resolution input and discriminator results.

use std::collections::BTreeMap;
use std::fmt;

use rigging_common::value::AttrValue;

use crate::component::SharedComponent;

/// Loosely-typed value supplied for a dependency slot.
#[derive(Clone, Default)]
pub enum DependencyValue {
    /// Nothing supplied.
    #[default]
    Absent,
    /// Raw configuration: a scalar, an envelope, constructor arguments, or a
    /// list or map of those.
    Value(AttrValue),
    /// Pre-built instance to inject as-is.
    Instance(SharedComponent),
    /// Ordered collection, each element resolved independently.
    List(Vec<DependencyValue>),
    /// Named collection, each value resolved independently.
    Keyed(BTreeMap<String, DependencyValue>),
}

impl DependencyValue {
    /// Whether nothing usable was supplied.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent | Self::Value(AttrValue::Null))
    }

    /// Raw value, if this is one.
    #[must_use]
    pub const fn as_value(&self) -> Option<&AttrValue> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for DependencyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("Absent"),
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Instance(c) => f
                .debug_tuple("Instance")
                .field(&c.borrow().class_name())
                .finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Keyed(entries) => f.debug_tuple("Keyed").field(entries).finish(),
        }
    }
}

impl From<AttrValue> for DependencyValue {
    fn from(value: AttrValue) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for DependencyValue {
    fn from(value: &str) -> Self {
        Self::Value(value.into())
    }
}

impl From<SharedComponent> for DependencyValue {
    fn from(instance: SharedComponent) -> Self {
        Self::Instance(instance)
    }
}

impl From<Vec<DependencyValue>> for DependencyValue {
    fn from(items: Vec<Self>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, DependencyValue>> for DependencyValue {
    fn from(entries: BTreeMap<String, Self>) -> Self {
        Self::Keyed(entries)
    }
}

/// Option chosen by a discriminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct When {
    /// Option name.
    pub option: String,
    /// When set, a present raw value is rewrapped as `{rebind_as: value}`.
    pub rebind_as: Option<String>,
}

impl When {
    /// Selects `option`, passing the raw value through unchanged.
    #[must_use]
    pub fn option(option: impl Into<String>) -> Self {
        Self {
            option: option.into(),
            rebind_as: None,
        }
    }

    /// Rebinds the raw value as the single constructor argument `name`.
    #[must_use]
    pub fn rebind_as(mut self, name: impl Into<String>) -> Self {
        self.rebind_as = Some(name.into());
        self
    }
}
