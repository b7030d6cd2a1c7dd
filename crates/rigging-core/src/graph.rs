//! Realized dependency instances of one host.
//!
//! Each entry mirrors the shape of the input it was resolved from: a single
//! binding, an ordered list, or a named map. Every binding records the
//! option that produced (or matched) its instance.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::component::SharedComponent;
use crate::option::DependencyOption;

/// A live instance and the option it was built or matched through.
#[derive(Clone)]
pub struct Binding {
    instance: SharedComponent,
    option: Rc<DependencyOption>,
}

impl Binding {
    /// Pairs an instance with its option.
    #[must_use]
    pub const fn new(instance: SharedComponent, option: Rc<DependencyOption>) -> Self {
        Self { instance, option }
    }

    /// The instance.
    #[must_use]
    pub const fn instance(&self) -> &SharedComponent {
        &self.instance
    }

    /// The recorded option.
    #[must_use]
    pub fn option(&self) -> &DependencyOption {
        &self.option
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("option", &self.option.name())
            .field("instance", &self.instance.borrow())
            .finish()
    }
}

/// Result of resolving one dependency.
#[derive(Debug, Clone)]
pub enum Realized {
    /// Scalar input.
    Single(Binding),
    /// List input, order preserved.
    List(Vec<Binding>),
    /// Named collection input, keys preserved.
    Keyed(BTreeMap<String, Binding>),
}

impl Realized {
    /// Every binding, in list or key order.
    #[must_use]
    pub fn bindings(&self) -> Vec<&Binding> {
        match self {
            Self::Single(binding) => vec![binding],
            Self::List(bindings) => bindings.iter().collect(),
            Self::Keyed(bindings) => bindings.values().collect(),
        }
    }

    /// The binding of a scalar entry.
    #[must_use]
    pub const fn single(&self) -> Option<&Binding> {
        match self {
            Self::Single(binding) => Some(binding),
            _ => None,
        }
    }

    /// Instance of a scalar entry.
    #[must_use]
    pub fn instance(&self) -> Option<SharedComponent> {
        self.single().map(|b| Rc::clone(b.instance()))
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(bindings) => bindings.len(),
            Self::Keyed(bindings) => bindings.len(),
        }
    }

    /// Whether the entry holds no instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Realized dependencies of one host, keyed by component name.
///
/// A present entry holding `None` is a dependency that resolved to no
/// instance; an absent entry is one not resolved yet.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    entries: BTreeMap<String, Option<Realized>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or replaces a component's entry.
    pub fn insert(&mut self, component: impl Into<String>, realized: Option<Realized>) {
        let _ = self.entries.insert(component.into(), realized);
    }

    /// Whether `component` has been resolved.
    #[must_use]
    pub fn is_built(&self, component: &str) -> bool {
        self.entries.contains_key(component)
    }

    /// Realized entry of `component`, if resolved to an instance.
    #[must_use]
    pub fn get(&self, component: &str) -> Option<&Realized> {
        self.entries.get(component).and_then(Option::as_ref)
    }

    /// Every resolved entry, in component order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Realized>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Every live binding with its component name.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.entries.iter().flat_map(|(name, realized)| {
            realized
                .iter()
                .flat_map(Realized::bindings)
                .map(move |binding| (name.as_str(), binding))
        })
    }
}
