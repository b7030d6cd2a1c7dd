//! Options: one concrete implementation of a polymorphic dependency.

use std::rc::Rc;

use rigging_common::config::RiggingConfig;
use rigging_common::error::{Result, RiggingError};
use rigging_common::value::AttributeMap;

use crate::attribute::ConfigAttr;
use crate::class::{ClassRef, ClassRegistry, ComponentClass};
use crate::component::SharedComponent;
use crate::dependency::ResolveContext;
use crate::store::AttributeStore;

/// Builder for a [`DependencyOption`].
#[derive(Debug, Clone)]
pub struct OptionBuilder {
    name: String,
    class: Option<ClassRef>,
    attributes: Vec<ConfigAttr>,
    is_default: bool,
    is_only: bool,
}

impl OptionBuilder {
    /// Starts an option named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: None,
            attributes: Vec::new(),
            is_default: false,
            is_only: false,
        }
    }

    /// Sets the class this option builds.
    #[must_use]
    pub fn class(mut self, class: impl Into<ClassRef>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Binds an attribute; a later binding replaces an earlier one with the
    /// same name.
    #[must_use]
    pub fn bind(mut self, attr: ConfigAttr) -> Self {
        self.attributes.retain(|a| a.name() != attr.name());
        self.attributes.push(attr);
        self
    }

    /// Marks this option as the one used when nothing selects another.
    #[must_use]
    pub const fn default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Marks this option as the dependency's single implementation.
    #[must_use]
    pub const fn only(mut self) -> Self {
        self.is_only = true;
        self
    }

    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) const fn is_default(&self) -> bool {
        self.is_default
    }

    pub(crate) const fn is_only(&self) -> bool {
        self.is_only
    }

    pub(crate) fn build(self, component: &str, registry: &ClassRegistry) -> Result<DependencyOption> {
        let class = self.class.ok_or_else(|| RiggingError::Definition {
            message: format!("option \"{}\" of {component} has no class", self.name),
        })?;
        Ok(DependencyOption {
            name: self.name,
            class: class.resolve(registry)?,
            attributes: self.attributes,
            is_default: self.is_default,
            is_only: self.is_only,
        })
    }
}

impl From<&DependencyOption> for OptionBuilder {
    fn from(option: &DependencyOption) -> Self {
        Self {
            name: option.name.clone(),
            class: Some(ClassRef::Class(Rc::clone(&option.class))),
            attributes: option.attributes.clone(),
            is_default: option.is_default,
            is_only: option.is_only,
        }
    }
}

/// An immutable option of a built dependency definition.
#[derive(Debug)]
pub struct DependencyOption {
    name: String,
    class: Rc<ComponentClass>,
    attributes: Vec<ConfigAttr>,
    is_default: bool,
    is_only: bool,
}

impl DependencyOption {
    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class this option builds.
    #[must_use]
    pub fn class(&self) -> &ComponentClass {
        &self.class
    }

    /// Identifier of the class this option builds.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    /// Bound attributes, in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[ConfigAttr] {
        &self.attributes
    }

    /// Bound attribute named `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ConfigAttr> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Whether this is the default option.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.is_default
    }

    /// Whether this is the single implementation of its dependency.
    #[must_use]
    pub const fn is_only(&self) -> bool {
        self.is_only
    }

    /// Computes constructor arguments.
    ///
    /// Every bound attribute missing from `supplied` is read from the
    /// parent (its source, else its own name), else defaulted, then
    /// resolved. Supplied values win. Blank values are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the result contains a reserved name.
    pub fn build_args(
        &self,
        component: &str,
        supplied: AttributeMap,
        parent: &AttributeStore,
        config: &RiggingConfig,
    ) -> Result<AttributeMap> {
        let mut args = AttributeMap::new();
        for attr in &self.attributes {
            if supplied.contains_key(attr.name()) {
                continue;
            }
            if let Some(value) = attr.resolve(attr.read_parent(parent), parent) {
                let _ = args.insert(attr.name().to_owned(), value);
            }
        }
        args.extend(supplied);
        args.retain(|_, v| !v.is_blank());

        if let Some(name) = args.keys().find(|k| config.is_reserved(k)) {
            return Err(RiggingError::ReservedAttribute {
                component: component.to_owned(),
                option: self.name.clone(),
                name: name.clone(),
            });
        }
        Ok(args)
    }

    /// Builds constructor arguments and instantiates the class, restoring
    /// it instead when the context carries stored input.
    ///
    /// # Errors
    ///
    /// Returns an error if argument building or construction fails.
    pub fn construct(
        &self,
        component: &str,
        supplied: AttributeMap,
        ctx: &ResolveContext<'_>,
    ) -> Result<SharedComponent> {
        let args = self.build_args(component, supplied, ctx.parent, ctx.config)?;
        tracing::debug!(
            component,
            option = %self.name,
            class = %self.class.name(),
            args = args.len(),
            restoring = ctx.restoring,
            "constructing dependency"
        );
        if ctx.restoring {
            self.class.restore(args)
        } else {
            self.class.construct(args)
        }
    }

    /// Bound attributes fed by the parent attribute `changed`: those whose
    /// source or own name is `changed`, provided the parent declares it.
    pub fn bound_to<'a>(
        &'a self,
        changed: &'a str,
        parent: &'a AttributeStore,
    ) -> impl Iterator<Item = &'a ConfigAttr> + 'a {
        let declared = parent.declares(changed);
        self.attributes
            .iter()
            .filter(move |attr| declared && (attr.source_name() == Some(changed) || attr.name() == changed))
    }
}
