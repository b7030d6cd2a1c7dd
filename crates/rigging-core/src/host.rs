//! Host definitions and host instances.
//!
//! A [`HostDefinition`] is the immutable, per-type description of a host:
//! its plain attributes, dependency slots, associations, and delegated
//! methods. A [`Host`] owns one attribute store and one dependency graph
//! built from it, and keeps dependency attributes in step with its own.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use rigging_common::config::RiggingConfig;
use rigging_common::error::{Result, RiggingError};
use rigging_common::validation::ValidationErrors;
use rigging_common::value::{AttrValue, AttributeMap};

use crate::attribute::ConfigAttr;
use crate::class::{ClassRegistry, ComponentClass};
use crate::component::{Component, SharedComponent, shared};
use crate::dependency::{DependencyBuilder, DependencyDefinition, ResolveContext};
use crate::graph::{DependencyGraph, Realized};
use crate::input::DependencyValue;
use crate::store::AttributeStore;

/// A relation managed by the persistence layer, restored from storage
/// rather than from the configuration blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// Attribute name the relation is exposed under.
    pub name: String,
    /// Column holding the related record's key.
    pub foreign_key: String,
}

/// A host method that reads an attribute of a scalar dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegate {
    /// Method name on the host.
    pub method: String,
    /// Dependency slot the call is forwarded to.
    pub dependency: String,
    /// Attribute read from the dependency instance.
    pub attribute: String,
}

#[derive(Debug)]
enum DependencySlot {
    Builder(DependencyBuilder),
    Built(Rc<DependencyDefinition>),
}

impl DependencySlot {
    fn name(&self) -> &str {
        match self {
            Self::Builder(builder) => builder.name(),
            Self::Built(definition) => definition.name(),
        }
    }
}

/// Builder for a [`HostDefinition`].
#[derive(Debug)]
pub struct HostDefinitionBuilder {
    name: String,
    attributes: Vec<ConfigAttr>,
    dependencies: Vec<DependencySlot>,
    associations: Vec<Association>,
    delegates: Vec<Delegate>,
    config: RiggingConfig,
}

impl HostDefinitionBuilder {
    /// Declares a plain attribute; replaces one with the same name.
    #[must_use]
    pub fn attribute(mut self, attr: ConfigAttr) -> Self {
        self.attributes.retain(|a| a.name() != attr.name());
        self.attributes.push(attr);
        self
    }

    /// Declares a dependency slot; replaces one with the same name.
    #[must_use]
    pub fn dependency(self, dependency: DependencyBuilder) -> Self {
        self.slot(DependencySlot::Builder(dependency))
    }

    /// Declares a dependency slot from an already built definition.
    #[must_use]
    pub fn dependency_definition(self, definition: Rc<DependencyDefinition>) -> Self {
        self.slot(DependencySlot::Built(definition))
    }

    fn slot(mut self, slot: DependencySlot) -> Self {
        self.dependencies.retain(|d| d.name() != slot.name());
        self.dependencies.push(slot);
        self
    }

    /// Declares an association exposed as attribute `name`.
    #[must_use]
    pub fn association(mut self, name: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        let name = name.into();
        self.associations.retain(|a| a.name != name);
        self.associations.push(Association {
            name,
            foreign_key: foreign_key.into(),
        });
        self
    }

    /// Declares the host method `method`, reading `attribute` of the
    /// scalar dependency `dependency`.
    #[must_use]
    pub fn delegate(
        mut self,
        method: impl Into<String>,
        dependency: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.delegates.push(Delegate {
            method: method.into(),
            dependency: dependency.into(),
            attribute: attribute.into(),
        });
        self
    }

    /// Replaces the wire-level settings.
    #[must_use]
    pub fn config(mut self, config: RiggingConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a name is declared
    /// twice across attributes, dependencies and associations, a delegate
    /// is duplicated or targets an undeclared dependency, or a dependency
    /// definition fails to build.
    pub fn build(self, registry: &ClassRegistry) -> Result<Rc<HostDefinition>> {
        self.config.validate()?;

        let mut seen = BTreeSet::new();
        let names = self
            .attributes
            .iter()
            .map(ConfigAttr::name)
            .chain(self.dependencies.iter().map(DependencySlot::name))
            .chain(self.associations.iter().map(|a| a.name.as_str()));
        for name in names {
            if !seen.insert(name) {
                return Err(definition_err(format!("{} declares {name} twice", self.name)));
            }
        }

        let mut methods = BTreeSet::new();
        for delegate in &self.delegates {
            if !methods.insert(delegate.method.as_str()) {
                return Err(definition_err(format!(
                    "{} delegates method {} twice",
                    self.name, delegate.method
                )));
            }
            if !self.dependencies.iter().any(|d| d.name() == delegate.dependency) {
                return Err(definition_err(format!(
                    "{} delegates {} to undeclared dependency {}",
                    self.name, delegate.method, delegate.dependency
                )));
            }
        }

        let dependencies = self
            .dependencies
            .into_iter()
            .map(|slot| match slot {
                DependencySlot::Builder(builder) => builder.build(registry).map(Rc::new),
                DependencySlot::Built(definition) => Ok(definition),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut schema = self.attributes.clone();
        schema.extend(self.associations.iter().map(|a| ConfigAttr::new(a.name.clone())));

        tracing::info!(
            host = %self.name,
            attributes = self.attributes.len(),
            dependencies = dependencies.len(),
            associations = self.associations.len(),
            "built host definition"
        );
        Ok(Rc::new(HostDefinition {
            name: self.name,
            attributes: self.attributes,
            schema,
            dependencies,
            associations: self.associations,
            delegates: self.delegates,
            config: self.config,
        }))
    }
}

/// Immutable description of one host type.
#[derive(Debug)]
pub struct HostDefinition {
    name: String,
    attributes: Vec<ConfigAttr>,
    schema: Vec<ConfigAttr>,
    dependencies: Vec<Rc<DependencyDefinition>>,
    associations: Vec<Association>,
    delegates: Vec<Delegate>,
    config: RiggingConfig,
}

impl HostDefinition {
    /// Starts a definition for the host type `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> HostDefinitionBuilder {
        HostDefinitionBuilder {
            name: name.into(),
            attributes: Vec::new(),
            dependencies: Vec::new(),
            associations: Vec::new(),
            delegates: Vec::new(),
            config: RiggingConfig::default(),
        }
    }

    /// Starts a definition named `name` carrying every entry of `base`.
    #[must_use]
    pub fn extend(base: &Self, name: impl Into<String>) -> HostDefinitionBuilder {
        HostDefinitionBuilder {
            name: name.into(),
            attributes: base.attributes.clone(),
            dependencies: base
                .dependencies
                .iter()
                .map(|d| DependencySlot::Built(Rc::clone(d)))
                .collect(),
            associations: base.associations.clone(),
            delegates: base.delegates.clone(),
            config: base.config.clone(),
        }
    }

    /// Host type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared plain attributes.
    #[must_use]
    pub fn attributes(&self) -> &[ConfigAttr] {
        &self.attributes
    }

    /// Declared plain attribute named `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ConfigAttr> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// Dependency definitions, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[Rc<DependencyDefinition>] {
        &self.dependencies
    }

    /// Dependency definition named `name`.
    #[must_use]
    pub fn dependency(&self, name: &str) -> Option<&Rc<DependencyDefinition>> {
        self.dependencies.iter().find(|d| d.name() == name)
    }

    /// Declared associations.
    #[must_use]
    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    /// Association named `name`.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    /// Declared delegated methods.
    #[must_use]
    pub fn delegates(&self) -> &[Delegate] {
        &self.delegates
    }

    /// Wire-level settings.
    #[must_use]
    pub const fn config(&self) -> &RiggingConfig {
        &self.config
    }

    /// Attribute store schema: plain attributes plus association names.
    #[must_use]
    pub fn schema(&self) -> &[ConfigAttr] {
        &self.schema
    }
}

impl ComponentClass {
    /// A class whose instances are hosts of `definition`, so that
    /// dependency graphs nest.
    #[must_use]
    pub fn host(definition: &Rc<HostDefinition>) -> Self {
        let build = Rc::clone(definition);
        let restore = Rc::clone(definition);
        Self::new(definition.name().to_owned(), move |args| {
            let input = HostInput::from_map(&build, args);
            Ok(shared(Host::new(&build, input)?))
        })
        .with_restore(move |args| {
            let input = HostInput::from_map(&restore, args).restored();
            Ok(shared(Host::new(&restore, input)?))
        })
    }
}

/// Construction input of a host.
#[derive(Debug, Default)]
pub struct HostInput {
    /// Plain and association attribute values.
    pub attributes: AttributeMap,
    /// Dependency inputs by slot name.
    pub dependencies: BTreeMap<String, DependencyValue>,
    /// Whether the values were read back from a stored blob. Stored
    /// attributes were transformed when first assigned, so they are
    /// committed as they are.
    pub restored: bool,
}

impl HostInput {
    /// Empty input.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits a flat map into attributes and dependency inputs.
    #[must_use]
    pub fn from_map(definition: &HostDefinition, entries: AttributeMap) -> Self {
        let mut input = Self::new();
        for (name, value) in entries {
            if definition.dependency(&name).is_some() {
                let _ = input.dependencies.insert(name, DependencyValue::Value(value));
            } else {
                let _ = input.attributes.insert(name, value);
            }
        }
        input
    }

    /// Adds an attribute value.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Marks the input as read back from a stored blob.
    #[must_use]
    pub const fn restored(mut self) -> Self {
        self.restored = true;
        self
    }

    /// Adds a dependency input.
    #[must_use]
    pub fn dependency(mut self, name: impl Into<String>, value: impl Into<DependencyValue>) -> Self {
        let _ = self.dependencies.insert(name.into(), value.into());
        self
    }
}

/// A live host: attribute store, dependency graph, and propagation.
#[derive(Debug)]
pub struct Host {
    definition: Rc<HostDefinition>,
    store: AttributeStore,
    graph: DependencyGraph,
    pending: BTreeMap<String, DependencyValue>,
    restored: bool,
    initialized: bool,
}

impl Host {
    /// Constructs a host: assigns attributes, then resolves every eager
    /// dependency. Lazy dependencies keep their input until first access.
    ///
    /// Restored input skips attribute transforms, and its dependencies are
    /// restored through their classes rather than built afresh.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute or dependency is undeclared, or a
    /// dependency fails to resolve.
    pub fn new(definition: &Rc<HostDefinition>, input: HostInput) -> Result<Self> {
        let mut host = Self {
            definition: Rc::clone(definition),
            store: AttributeStore::new(definition.name(), definition.schema()),
            graph: DependencyGraph::new(),
            pending: BTreeMap::new(),
            restored: input.restored,
            initialized: false,
        };

        for (name, value) in input.attributes {
            let _ = host.write_plain(&name, value, !input.restored)?;
        }

        let mut inputs = input.dependencies;
        if let Some(name) = inputs.keys().find(|k| definition.dependency(k).is_none()) {
            return Err(RiggingError::UnknownDependency {
                host: definition.name().to_owned(),
                name: name.clone(),
            });
        }
        for dependency in definition.dependencies() {
            let value = inputs.remove(dependency.name()).unwrap_or_default();
            if dependency.is_lazy() {
                let _ = host.pending.insert(dependency.name().to_owned(), value);
            } else {
                host.build_dependency(dependency, value, input.restored)?;
            }
        }

        host.store.clear_changes();
        host.initialized = true;
        tracing::debug!(
            host = %definition.name(),
            built = host.graph.iter().count(),
            pending = host.pending.len(),
            restored = host.restored,
            "constructed host"
        );
        Ok(host)
    }

    /// The definition this host was built from.
    #[must_use]
    pub fn definition(&self) -> &Rc<HostDefinition> {
        &self.definition
    }

    /// The host's attribute store.
    #[must_use]
    pub const fn store(&self) -> &AttributeStore {
        &self.store
    }

    /// Realized dependencies.
    #[must_use]
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Unresolved input of a lazy dependency.
    #[must_use]
    pub fn pending(&self, name: &str) -> Option<&DependencyValue> {
        self.pending.get(name)
    }

    /// Current value of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.store.get(name)
    }

    /// Assigns one attribute, or reassigns a dependency when `name` is a
    /// dependency slot. Returns whether the value changed.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared, or a dependency fails to
    /// resolve or to accept a propagated value.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> Result<bool> {
        let value = value.into();
        if self.definition.dependency(name).is_some() {
            self.set_dependency(name, value)?;
            return Ok(true);
        }
        let changed = self.write_plain(name, value, true)?;
        if changed && self.initialized {
            self.propagate(name)?;
        }
        Ok(changed)
    }

    /// Assigns many values: every attribute is committed first, then each
    /// change is propagated in key order, then dependencies are reassigned.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Host::set`].
    pub fn assign_attributes(&mut self, entries: AttributeMap) -> Result<()> {
        let mut changed = Vec::new();
        let mut dependencies = Vec::new();
        for (name, value) in entries {
            if self.definition.dependency(&name).is_some() {
                dependencies.push((name, value));
            } else if self.write_plain(&name, value, true)? {
                changed.push(name);
            }
        }
        if self.initialized {
            for name in &changed {
                self.propagate(name)?;
            }
        }
        for (name, value) in dependencies {
            self.set_dependency(&name, value)?;
        }
        Ok(())
    }

    fn write_plain(&mut self, name: &str, value: AttrValue, transform: bool) -> Result<bool> {
        let definition = Rc::clone(&self.definition);
        let value = match definition.attribute(name) {
            Some(attr) if transform && value != AttrValue::Null => attr.apply_transform(value, &self.store),
            _ => value,
        };
        self.store.set(name, value)
    }

    /// Pushes the committed value of `changed` into every realized
    /// dependency whose option binds it.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency rejects the propagated value.
    pub fn propagate(&self, changed: &str) -> Result<()> {
        let value = self.store.get(changed).cloned();
        for (component, binding) in self.graph.bindings() {
            for attr in binding.option().bound_to(changed, &self.store) {
                let next = attr.resolve(value.clone(), &self.store).unwrap_or_default();
                let written = binding
                    .instance()
                    .borrow_mut()
                    .write_attribute(attr.name(), next)?;
                if written {
                    tracing::trace!(
                        host = %self.definition.name(),
                        component,
                        source = changed,
                        attribute = attr.name(),
                        "propagated attribute"
                    );
                }
            }
        }
        Ok(())
    }

    /// Re-resolves the dependency `name` from `value`, replacing its entry.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or resolution fails.
    pub fn set_dependency(&mut self, name: &str, value: impl Into<DependencyValue>) -> Result<()> {
        let definition = self.dependency_definition(name)?;
        let _ = self.pending.remove(name);
        self.build_dependency(&definition, value.into(), false)
    }

    /// Realized entry of the dependency `name`, resolving a lazy one on
    /// first access.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` is undeclared or resolution fails.
    pub fn dependency(&mut self, name: &str) -> Result<Option<&Realized>> {
        if !self.graph.is_built(name) {
            let definition = self.dependency_definition(name)?;
            let value = self.pending.remove(name).unwrap_or_default();
            self.build_dependency(&definition, value, self.restored)?;
        }
        Ok(self.graph.get(name))
    }

    /// Instance of the scalar dependency `name`.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as [`Host::dependency`].
    pub fn instance(&mut self, name: &str) -> Result<Option<SharedComponent>> {
        Ok(self.dependency(name)?.and_then(Realized::instance))
    }

    /// Realized entry of `name` without resolving a pending one.
    #[must_use]
    pub fn built_dependency(&self, name: &str) -> Option<&Realized> {
        self.graph.get(name)
    }

    /// Calls the delegated method `method`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is undeclared, the dependency fails
    /// to resolve, or it holds a collection.
    pub fn delegated(&mut self, method: &str) -> Result<Option<AttrValue>> {
        let delegate = self
            .definition
            .delegates()
            .iter()
            .find(|d| d.method == method)
            .cloned()
            .ok_or_else(|| RiggingError::UnknownDependency {
                host: self.definition.name().to_owned(),
                name: method.to_owned(),
            })?;
        match self.dependency(&delegate.dependency)? {
            None => Ok(None),
            Some(Realized::Single(binding)) => Ok(binding.instance().borrow().read_attribute(&delegate.attribute)),
            Some(_) => Err(RiggingError::InvalidInput {
                component: delegate.dependency,
                message: format!("delegated method {method} needs a single instance"),
            }),
        }
    }

    /// Validates required attributes and every realized dependency.
    #[must_use]
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();
        for attr in self.definition.attributes() {
            if attr.is_required() && self.store.get(attr.name()).is_none_or(AttrValue::is_blank) {
                errors.add(attr.name(), "can't be blank");
            }
        }
        errors.merge(crate::validation::validate_dependencies(self));
        errors
    }

    /// Validates, failing on the first non-empty error set.
    ///
    /// # Errors
    ///
    /// Returns [`RiggingError::Invalid`] carrying every collected error.
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RiggingError::Invalid { errors })
        }
    }

    /// Attributes changed since construction or the last clear.
    pub fn changes(&self) -> impl Iterator<Item = &str> {
        self.store.changes()
    }

    /// Forgets recorded changes.
    pub fn clear_changes(&mut self) {
        self.store.clear_changes();
    }

    fn dependency_definition(&self, name: &str) -> Result<Rc<DependencyDefinition>> {
        self.definition
            .dependency(name)
            .cloned()
            .ok_or_else(|| RiggingError::UnknownDependency {
                host: self.definition.name().to_owned(),
                name: name.to_owned(),
            })
    }

    fn build_dependency(
        &mut self,
        definition: &DependencyDefinition,
        value: DependencyValue,
        restoring: bool,
    ) -> Result<()> {
        let ctx = ResolveContext::new(&self.store, self.definition.config()).restoring(restoring);
        let realized = definition.resolve(value, &ctx)?;
        self.graph.insert(definition.name(), realized);
        Ok(())
    }
}

impl Component for Host {
    fn class_name(&self) -> &str {
        self.definition.name()
    }

    fn attributes(&self) -> AttributeMap {
        self.store.to_map()
    }

    fn read_attribute(&self, name: &str) -> Option<AttrValue> {
        self.store.get(name).cloned()
    }

    fn write_attribute(&mut self, name: &str, value: AttrValue) -> Result<bool> {
        if !self.store.declares(name) && self.definition.dependency(name).is_none() {
            return Ok(false);
        }
        let _ = self.set(name, value)?;
        Ok(true)
    }

    fn serialize(&self) -> Result<Option<AttrValue>> {
        crate::dump::dump_host(self).map(Some)
    }

    fn validate(&self) -> ValidationErrors {
        Self::validate(self)
    }
}

fn definition_err(message: String) -> RiggingError {
    RiggingError::Definition { message }
}
