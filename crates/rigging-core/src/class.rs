//! Component classes and the class registry.
//!
//! Options name the class they build either by value or by registry
//! identifier. Identifiers are resolved when a definition is built, so an
//! unknown class fails the definition rather than the first construction.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};

use crate::component::{PlainComponent, SharedComponent, shared};

/// Builds an instance from constructor arguments.
pub type Constructor = Rc<dyn Fn(AttributeMap) -> Result<SharedComponent>>;

/// Rewrites a stored value before it is resolved on load.
pub type DeserializeHook = Rc<dyn Fn(AttrValue) -> Result<AttrValue>>;

/// A constructible component type.
pub struct ComponentClass {
    name: String,
    constructor: Constructor,
    restorer: Option<Constructor>,
    deserialize: Option<DeserializeHook>,
}

impl ComponentClass {
    /// Creates a class from a constructor. Instances it returns must report
    /// `name` as their class name.
    pub fn new(
        name: impl Into<String>,
        constructor: impl Fn(AttributeMap) -> Result<SharedComponent> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            constructor: Rc::new(constructor),
            restorer: None,
            deserialize: None,
        }
    }

    /// Creates a class of [`PlainComponent`]s with the given fields.
    pub fn plain(name: impl Into<String>, fields: &[&str]) -> Self {
        let name = name.into();
        let class = name.clone();
        let fields: Vec<String> = fields.iter().map(|f| (*f).to_owned()).collect();
        Self::new(name, move |args| {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            Ok(shared(PlainComponent::new(&class, &fields, args)?))
        })
    }

    /// Adds a hook applied to this class's stored values on load.
    #[must_use]
    pub fn with_deserialize(
        mut self,
        hook: impl Fn(AttrValue) -> Result<AttrValue> + 'static,
    ) -> Self {
        self.deserialize = Some(Rc::new(hook));
        self
    }

    /// Adds a constructor used for arguments read back from a stored blob,
    /// which must not be transformed a second time.
    #[must_use]
    pub fn with_restore(
        mut self,
        restorer: impl Fn(AttributeMap) -> Result<SharedComponent> + 'static,
    ) -> Self {
        self.restorer = Some(Rc::new(restorer));
        self
    }

    /// Class identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a load hook is declared.
    #[must_use]
    pub const fn has_deserialize(&self) -> bool {
        self.deserialize.is_some()
    }

    /// Builds an instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the constructor fails or returns an instance of
    /// a different class.
    pub fn construct(&self, args: AttributeMap) -> Result<SharedComponent> {
        self.checked((self.constructor)(args)?)
    }

    /// Rebuilds an instance from stored arguments, through the restore
    /// constructor when one is declared.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as
    /// [`ComponentClass::construct`].
    pub fn restore(&self, args: AttributeMap) -> Result<SharedComponent> {
        match &self.restorer {
            Some(restorer) => self.checked(restorer(args)?),
            None => self.construct(args),
        }
    }

    fn checked(&self, instance: SharedComponent) -> Result<SharedComponent> {
        let actual = instance.borrow().class_name().to_owned();
        if actual != self.name {
            return Err(RiggingError::Construction {
                class: self.name.clone(),
                message: format!("constructor produced an instance of \"{actual}\""),
            });
        }
        Ok(instance)
    }

    /// Applies the load hook, or returns the value unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the hook rejects the value.
    pub fn deserialize(&self, value: AttrValue) -> Result<AttrValue> {
        match &self.deserialize {
            Some(hook) => hook(value),
            None => Ok(value),
        }
    }
}

impl fmt::Debug for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentClass")
            .field("name", &self.name)
            .field("deserialize", &self.has_deserialize())
            .finish_non_exhaustive()
    }
}

/// Reference to a class, by registry identifier or by value.
#[derive(Debug, Clone)]
pub enum ClassRef {
    /// Identifier looked up in a [`ClassRegistry`].
    Named(String),
    /// Class given directly.
    Class(Rc<ComponentClass>),
}

impl ClassRef {
    /// Resolves the reference.
    ///
    /// # Errors
    ///
    /// Returns an error if a named class is not registered.
    pub fn resolve(&self, registry: &ClassRegistry) -> Result<Rc<ComponentClass>> {
        match self {
            Self::Named(name) => registry.get(name),
            Self::Class(class) => Ok(Rc::clone(class)),
        }
    }
}

impl From<&str> for ClassRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_owned())
    }
}

impl From<String> for ClassRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Rc<ComponentClass>> for ClassRef {
    fn from(class: Rc<ComponentClass>) -> Self {
        Self::Class(class)
    }
}

impl From<ComponentClass> for ClassRef {
    fn from(class: ComponentClass) -> Self {
        Self::Class(Rc::new(class))
    }
}

/// Identifier to class mapping.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: BTreeMap<String, Rc<ComponentClass>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class, replacing any class with the same identifier.
    pub fn register(&mut self, class: ComponentClass) -> Rc<ComponentClass> {
        let class = Rc::new(class);
        tracing::debug!(class = %class.name(), "registering component class");
        let _ = self
            .classes
            .insert(class.name().to_owned(), Rc::clone(&class));
        class
    }

    /// Looks up a class.
    ///
    /// # Errors
    ///
    /// Returns an error if no class is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Rc<ComponentClass>> {
        self.classes
            .get(name)
            .cloned()
            .ok_or_else(|| RiggingError::UnknownClass {
                name: name.to_owned(),
            })
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registered identifiers, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}
