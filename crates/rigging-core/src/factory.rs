//! Factories: named, reusable bundles of dependency definitions.

use std::rc::Rc;

use rigging_common::error::{Result, RiggingError};

use crate::class::ClassRegistry;
use crate::dependency::{DependencyBuilder, DependencyDefinition};

/// Builder for a [`Factory`].
#[derive(Debug)]
pub struct FactoryBuilder {
    name: String,
    dependencies: Vec<DependencyBuilder>,
}

impl FactoryBuilder {
    /// Adds a dependency definition to the bundle.
    #[must_use]
    pub fn dependency(mut self, dependency: DependencyBuilder) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Builds every bundled definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the factory is empty, two definitions share a
    /// name, or a definition fails to build.
    pub fn build(self, registry: &ClassRegistry) -> Result<Rc<Factory>> {
        if self.dependencies.is_empty() {
            return Err(RiggingError::Definition {
                message: format!("factory \"{}\" bundles no dependencies", self.name),
            });
        }
        let mut dependencies: Vec<Rc<DependencyDefinition>> = Vec::with_capacity(self.dependencies.len());
        for builder in self.dependencies {
            if dependencies.iter().any(|d| d.name() == builder.name()) {
                return Err(RiggingError::Definition {
                    message: format!(
                        "factory \"{}\" declares dependency {} twice",
                        self.name,
                        builder.name()
                    ),
                });
            }
            dependencies.push(Rc::new(builder.build(registry)?));
        }
        tracing::info!(factory = %self.name, dependencies = dependencies.len(), "built factory");
        Ok(Rc::new(Factory {
            name: self.name,
            dependencies,
        }))
    }
}

/// A named bundle of dependency definitions that other definitions reuse.
#[derive(Debug)]
pub struct Factory {
    name: String,
    dependencies: Vec<Rc<DependencyDefinition>>,
}

impl Factory {
    /// Starts a factory named `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FactoryBuilder {
        FactoryBuilder {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Factory name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bundled definitions, in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[Rc<DependencyDefinition>] {
        &self.dependencies
    }

    /// The definition that serves the dependency slot `component`: the one
    /// with the same name, else the only one.
    ///
    /// # Errors
    ///
    /// Returns a definition error if neither applies.
    pub fn delegate_for(&self, component: &str) -> Result<Rc<DependencyDefinition>> {
        if let Some(found) = self.dependencies.iter().find(|d| d.name() == component) {
            return Ok(Rc::clone(found));
        }
        match self.dependencies.as_slice() {
            [single] => Ok(Rc::clone(single)),
            _ => Err(RiggingError::Definition {
                message: format!(
                    "don't know how to use factory \"{}\" for component {component}",
                    self.name
                ),
            }),
        }
    }
}
