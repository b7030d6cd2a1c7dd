//! Dependency definitions and the resolution algorithm.
//!
//! A [`DependencyDefinition`] holds the options of one named dependency slot
//! and decides, from loosely-typed input, which option to build:
//!
//! 1. Lists and named collections resolve element by element, keeping
//!    their shape.
//! 2. An injected instance whose class matches an option is accepted as-is.
//! 3. A factory-delegated definition hands the input to its delegate.
//! 4. An explicit `{option: .., value: ..}` envelope, or a single-key map
//!    whose key names an option, selects that option.
//! 5. The discriminator, if any, may select an option and rebind a bare
//!    value as a single named argument.
//! 6. Any other map must be constructor arguments: every key a bound
//!    attribute of the `only` option, or, for two or more keys, of the
//!    default option.
//! 7. The default option applies when nothing else selected one.
//!
//! Injected instances and serialized instances are matched to options by
//! class. When several options share a class, the option recorded at
//! resolution time is what gets serialized, and injection of that class is
//! ambiguous.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use rigging_common::config::RiggingConfig;
use rigging_common::constants;
use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};

use crate::attribute::ConfigAttr;
use crate::class::{ClassRef, ClassRegistry};
use crate::component::SharedComponent;
use crate::factory::Factory;
use crate::graph::{Binding, Realized};
use crate::input::{DependencyValue, When};
use crate::option::{DependencyOption, OptionBuilder};
use crate::store::AttributeStore;

/// Picks an option from the raw input and the parent's attributes.
pub type Discriminator = Rc<dyn Fn(Option<&AttrValue>, &AttributeStore) -> Option<When>>;

/// What resolution reads from the host.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    /// Parent attributes feeding bound attributes and the discriminator.
    pub parent: &'a AttributeStore,
    /// Wire-level settings.
    pub config: &'a RiggingConfig,
    /// Whether input comes from a stored blob, so constructed classes
    /// restore rather than build from scratch.
    pub restoring: bool,
}

impl<'a> ResolveContext<'a> {
    /// Context for fresh input.
    #[must_use]
    pub const fn new(parent: &'a AttributeStore, config: &'a RiggingConfig) -> Self {
        Self {
            parent,
            config,
            restoring: false,
        }
    }

    /// The same context, marked as restoring stored input.
    #[must_use]
    pub const fn restoring(mut self, restoring: bool) -> Self {
        self.restoring = restoring;
        self
    }
}

/// Builder for a [`DependencyDefinition`].
pub struct DependencyBuilder {
    name: String,
    options: Vec<OptionBuilder>,
    discriminator: Option<Discriminator>,
    factory: Option<Rc<Factory>>,
    lazy: bool,
}

impl DependencyBuilder {
    /// Starts a definition for the dependency slot `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            discriminator: None,
            factory: None,
            lazy: false,
        }
    }

    /// Adds (or replaces) the option `name`, configured by `configure`.
    #[must_use]
    pub fn option(
        mut self,
        name: impl Into<String>,
        configure: impl FnOnce(OptionBuilder) -> OptionBuilder,
    ) -> Self {
        let name = name.into();
        let position = self.options.iter().position(|o| o.name() == name);
        let builder = match position {
            Some(i) => self.options.remove(i),
            None => OptionBuilder::new(name),
        };
        self.options.push(configure(builder));
        self
    }

    /// Sets the class of the single, synthesized option.
    #[must_use]
    pub fn class(self, class: impl Into<ClassRef>) -> Self {
        let class = class.into();
        self.option(constants::SYNTHETIC_OPTION, |o| o.class(class).default().only())
    }

    /// Binds an attribute on the single, synthesized option.
    #[must_use]
    pub fn bind(self, attr: ConfigAttr) -> Self {
        self.option(constants::SYNTHETIC_OPTION, |o| o.bind(attr).default().only())
    }

    /// Sets the discriminator.
    #[must_use]
    pub fn when(
        mut self,
        discriminator: impl Fn(Option<&AttrValue>, &AttributeStore) -> Option<When> + 'static,
    ) -> Self {
        self.discriminator = Some(Rc::new(discriminator));
        self
    }

    /// Reuses the options of a dependency bundled in `factory`.
    #[must_use]
    pub fn factory(mut self, factory: &Rc<Factory>) -> Self {
        self.factory = Some(Rc::clone(factory));
        self
    }

    /// Defers resolution to first access; absent input then resolves to no
    /// instance instead of failing.
    #[must_use]
    pub const fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Dependency slot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the definition, resolving class identifiers.
    ///
    /// # Errors
    ///
    /// Returns an error if more than one option is marked default, an
    /// `only` option has siblings, options are mixed with a factory, the
    /// factory cannot serve this slot, or a class is unknown.
    pub fn build(self, registry: &ClassRegistry) -> Result<DependencyDefinition> {
        let name = self.name;
        let delegate = match &self.factory {
            Some(factory) if !self.options.is_empty() => {
                return Err(definition_err(format!(
                    "{name} declares its own options and delegates to factory \"{}\"",
                    factory.name()
                )));
            }
            Some(factory) if self.discriminator.is_some() => {
                return Err(definition_err(format!(
                    "{name} declares its own discriminator and delegates to factory \"{}\"",
                    factory.name()
                )));
            }
            Some(factory) => Some(factory.delegate_for(&name)?),
            None if self.options.is_empty() => {
                return Err(definition_err(format!("{name} declares no options")));
            }
            None => None,
        };

        let defaults: Vec<&str> = self
            .options
            .iter()
            .filter(|o| o.is_default())
            .map(OptionBuilder::name)
            .collect();
        if defaults.len() > 1 {
            return Err(definition_err(format!(
                "{name} declares multiple default options: {}",
                defaults.join(", ")
            )));
        }
        if self.options.len() > 1 {
            if let Some(only) = self.options.iter().find(|o| o.is_only()) {
                return Err(definition_err(format!(
                    "{name} marks option \"{}\" as its only option but declares {}",
                    only.name(),
                    self.options.len()
                )));
            }
        }

        let options = self
            .options
            .into_iter()
            .map(|o| o.build(&name, registry).map(Rc::new))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            component = %name,
            options = options.len(),
            delegate = ?delegate.as_ref().map(|d| d.name()),
            lazy = self.lazy,
            "built dependency definition"
        );
        Ok(DependencyDefinition {
            name,
            options,
            discriminator: self.discriminator,
            delegate,
            lazy: self.lazy,
        })
    }
}

impl fmt::Debug for DependencyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyBuilder")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("discriminator", &self.discriminator.is_some())
            .field("factory", &self.factory.as_ref().map(|f| f.name().to_owned()))
            .field("lazy", &self.lazy)
            .finish()
    }
}

/// Options of one dependency slot and how to choose among them.
pub struct DependencyDefinition {
    name: String,
    options: Vec<Rc<DependencyOption>>,
    discriminator: Option<Discriminator>,
    delegate: Option<Rc<DependencyDefinition>>,
    lazy: bool,
}

/// Outcome of option selection: the option and its supplied arguments.
type Selection = (Rc<DependencyOption>, AttributeMap);

impl DependencyDefinition {
    /// Starts a builder pre-populated with `base`'s options, discriminator,
    /// and laziness. A delegated base is not carried over.
    #[must_use]
    pub fn extend(base: &Self) -> DependencyBuilder {
        DependencyBuilder {
            name: base.name.clone(),
            options: base.options.iter().map(|o| OptionBuilder::from(o.as_ref())).collect(),
            discriminator: base.discriminator.clone(),
            factory: None,
            lazy: base.lazy,
        }
    }

    /// Dependency slot name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether resolution is deferred to first access.
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Delegate definition this one reuses.
    #[must_use]
    pub fn delegate(&self) -> Option<&Self> {
        self.delegate.as_deref()
    }

    /// The definition whose options are used: the delegate's, followed
    /// transitively, or this one.
    fn effective(&self) -> &Self {
        self.delegate.as_deref().map_or(self, Self::effective)
    }

    /// Options in declaration order.
    #[must_use]
    pub fn options(&self) -> &[Rc<DependencyOption>] {
        &self.effective().options
    }

    /// Option named `name`.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&Rc<DependencyOption>> {
        self.options().iter().find(|o| o.name() == name)
    }

    /// Option names in declaration order.
    #[must_use]
    pub fn option_names(&self) -> Vec<String> {
        self.options().iter().map(|o| o.name().to_owned()).collect()
    }

    /// The option whose class is `class_name`, `None` when no option
    /// builds that class.
    ///
    /// # Errors
    ///
    /// Returns [`RiggingError::InvalidInput`] if several options build that
    /// class, since an instance alone cannot tell them apart.
    pub fn option_for_class(&self, class_name: &str) -> Result<Option<&Rc<DependencyOption>>> {
        let matches: Vec<&Rc<DependencyOption>> = self
            .options()
            .iter()
            .filter(|o| o.class_name() == class_name)
            .collect();
        match matches.as_slice() {
            [] => Ok(None),
            [option] => Ok(Some(*option)),
            several => Err(RiggingError::InvalidInput {
                component: self.name.clone(),
                message: format!(
                    "an instance of \"{class_name}\" matches options {}",
                    several.iter().map(|o| o.name()).collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }

    /// The `only` option, if the dependency has a single implementation.
    #[must_use]
    pub fn only_option(&self) -> Option<&Rc<DependencyOption>> {
        self.options().iter().find(|o| o.is_only())
    }

    /// The option used when nothing selects another.
    #[must_use]
    pub fn default_option(&self) -> Option<&Rc<DependencyOption>> {
        self.options()
            .iter()
            .find(|o| o.is_default())
            .or_else(|| self.only_option())
    }

    /// Resolves input into realized instances.
    ///
    /// Returns `Ok(None)` only for a lazy definition with absent input and
    /// nothing selecting an option.
    ///
    /// # Errors
    ///
    /// Returns an error if no option can be chosen, the chosen option is
    /// unknown, the input has an unusable shape, or construction fails.
    pub fn resolve(&self, input: DependencyValue, ctx: &ResolveContext<'_>) -> Result<Option<Realized>> {
        match input {
            DependencyValue::List(items) => self.resolve_list(items, ctx).map(Some),
            DependencyValue::Value(AttrValue::List(items)) => self
                .resolve_list(items.into_iter().map(DependencyValue::Value).collect(), ctx)
                .map(Some),
            DependencyValue::Keyed(entries) => self.resolve_keyed(entries, ctx).map(Some),
            DependencyValue::Value(AttrValue::Map(entries)) if self.is_named_collection(&entries, ctx) =>
            {
                let entries = entries
                    .into_iter()
                    .map(|(k, v)| (k, DependencyValue::Value(v)))
                    .collect();
                self.resolve_keyed(entries, ctx).map(Some)
            }
            scalar => Ok(self
                .resolve_scalar(scalar, ctx, self.lazy)?
                .map(Realized::Single)),
        }
    }

    fn resolve_list(&self, items: Vec<DependencyValue>, ctx: &ResolveContext<'_>) -> Result<Realized> {
        tracing::debug!(component = %self.name, len = items.len(), "resolving dependency list");
        let bindings = items
            .into_iter()
            .map(|item| self.resolve_element(item, ctx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Realized::List(bindings))
    }

    fn resolve_keyed(
        &self,
        entries: BTreeMap<String, DependencyValue>,
        ctx: &ResolveContext<'_>,
    ) -> Result<Realized> {
        tracing::debug!(component = %self.name, len = entries.len(), "resolving named dependencies");
        let bindings = entries
            .into_iter()
            .map(|(key, item)| Ok((key, self.resolve_element(item, ctx)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Realized::Keyed(bindings))
    }

    fn resolve_element(&self, item: DependencyValue, ctx: &ResolveContext<'_>) -> Result<Binding> {
        self.resolve_scalar(item, ctx, false)?
            .ok_or_else(|| RiggingError::NoDefault {
                component: self.name.clone(),
            })
    }

    fn resolve_scalar(
        &self,
        input: DependencyValue,
        ctx: &ResolveContext<'_>,
        allow_absent: bool,
    ) -> Result<Option<Binding>> {
        let raw = match input {
            DependencyValue::Instance(instance) => return self.inject(instance).map(Some),
            DependencyValue::Absent | DependencyValue::Value(AttrValue::Null) => None,
            DependencyValue::Value(value) => Some(value),
            DependencyValue::List(_) | DependencyValue::Keyed(_) => {
                return Err(RiggingError::InvalidInput {
                    component: self.name.clone(),
                    message: "nested collections cannot be resolved".into(),
                });
            }
        };

        let definition = self.effective();
        if !std::ptr::eq(definition, self) {
            tracing::debug!(component = %self.name, delegate = %definition.name, "delegating to factory");
        }

        match definition.select(raw, ctx)? {
            Some((option, args)) => {
                let instance = option.construct(&self.name, args, ctx)?;
                Ok(Some(Binding::new(instance, option)))
            }
            None if allow_absent => {
                tracing::debug!(component = %self.name, "lazy dependency resolved to nothing");
                Ok(None)
            }
            None => Err(RiggingError::NoDefault {
                component: self.name.clone(),
            }),
        }
    }

    fn inject(&self, instance: SharedComponent) -> Result<Binding> {
        let class = instance.borrow().class_name().to_owned();
        let option = self
            .option_for_class(&class)?
            .ok_or_else(|| RiggingError::UnknownOption {
                component: self.name.clone(),
                option: class.clone(),
                allowed: self.option_names(),
            })?;
        tracing::debug!(component = %self.name, option = %option.name(), class = %class, "injecting instance");
        Ok(Binding::new(instance, Rc::clone(option)))
    }

    /// Chooses the option for a raw value without constructing anything.
    ///
    /// Returns `Ok(None)` when the value is absent and nothing selects an
    /// option.
    ///
    /// # Errors
    ///
    /// Returns an error under the same conditions as
    /// [`DependencyDefinition::resolve`], construction aside.
    pub fn select_option(
        &self,
        raw: Option<AttrValue>,
        ctx: &ResolveContext<'_>,
    ) -> Result<Option<(Rc<DependencyOption>, AttributeMap)>> {
        self.effective().select(raw.filter(|v| *v != AttrValue::Null), ctx)
    }

    fn select(&self, raw: Option<AttrValue>, ctx: &ResolveContext<'_>) -> Result<Option<Selection>> {
        let mut value = raw;
        let mut chosen = self.explicit_option(&mut value, ctx.config)?;

        if chosen.is_none() {
            if let Some(discriminator) = &self.discriminator {
                if let Some(When { option, rebind_as }) = discriminator(value.as_ref(), ctx.parent) {
                    tracing::debug!(component = %self.name, option = %option, rebind_as = ?rebind_as, "discriminator selected option");
                    if let Some(key) = rebind_as {
                        value = value.map(|v| AttrValue::map([(key, v)]));
                    }
                    chosen = Some(option);
                }
            }
        }

        if chosen.is_none() {
            if let Some(AttrValue::Map(entries)) = &value {
                self.check_argument_map(entries)?;
            }
        }

        let chosen = match chosen {
            Some(name) => name,
            None => match self.default_option() {
                Some(option) => option.name().to_owned(),
                None if value.is_none() => return Ok(None),
                None => {
                    return Err(RiggingError::NoDefault {
                        component: self.name.clone(),
                    });
                }
            },
        };

        let option = self
            .option(&chosen)
            .cloned()
            .ok_or_else(|| self.unknown_option(&chosen))?;
        let args = match value {
            None => AttributeMap::new(),
            Some(AttrValue::Map(entries)) => entries,
            Some(other) => {
                return Err(RiggingError::InvalidInput {
                    component: self.name.clone(),
                    message: format!(
                        "option \"{chosen}\" expects constructor arguments, got {} {other}",
                        other.kind()
                    ),
                });
            }
        };
        tracing::debug!(component = %self.name, option = %chosen, args = args.len(), "selected option");
        Ok(Some((option, args)))
    }

    /// Reads an explicit selection: an `{option, value}` envelope, or a
    /// single-key map whose key names an option. Unwraps `value` in place.
    fn explicit_option(&self, value: &mut Option<AttrValue>, config: &RiggingConfig) -> Result<Option<String>> {
        let Some(AttrValue::Map(entries)) = value.as_ref() else {
            return Ok(None);
        };

        if let Some(option) = entries.get(&config.option_key) {
            let name = option.as_str().ok_or_else(|| RiggingError::InvalidInput {
                component: self.name.clone(),
                message: format!("\"{}\" must name an option, got {option}", config.option_key),
            })?;
            let name = name.to_owned();
            let inner = entries
                .get(&config.value_key)
                .cloned()
                .filter(|v| *v != AttrValue::Null);
            *value = inner;
            return Ok(Some(name));
        }

        let named = entries
            .iter()
            .next()
            .filter(|(key, _)| entries.len() == 1 && self.option(key).is_some())
            .map(|(key, inner)| (key.clone(), inner.clone()));
        Ok(named.map(|(name, inner)| {
            *value = Some(inner).filter(|v| *v != AttrValue::Null);
            name
        }))
    }

    /// The option a map of constructor arguments feeds: the `only` option
    /// when it binds every key, else the default option when the map has
    /// two or more keys and it binds every one of them. A single key naming
    /// no option is shorthand for the `only` option and nothing else.
    fn argument_map_option(&self, entries: &AttributeMap) -> Option<&Rc<DependencyOption>> {
        let binds_all = |option: &Rc<DependencyOption>| entries.keys().all(|k| option.attribute(k).is_some());
        if let Some(only) = self.only_option() {
            return binds_all(only).then_some(only);
        }
        self.default_option()
            .filter(|&option| entries.len() > 1 && binds_all(option))
    }

    fn check_argument_map(&self, entries: &AttributeMap) -> Result<()> {
        if entries.is_empty() || self.argument_map_option(entries).is_some() {
            return Ok(());
        }
        let fallback = self.default_option();
        let key = entries
            .keys()
            .find(|k| fallback.is_none_or(|o| o.attribute(k).is_none()))
            .or_else(|| entries.keys().next())
            .map_or_else(String::new, Clone::clone);
        Err(self.unknown_option(&key))
    }

    /// Whether a raw map is a named collection rather than a single input.
    ///
    /// It is not when it is an envelope, a key names an option, its keys
    /// are constructor arguments, or the discriminator accepts the whole
    /// map. Otherwise every value must be option-shaped or accepted by the
    /// discriminator.
    #[must_use]
    pub fn is_named_collection(&self, entries: &AttributeMap, ctx: &ResolveContext<'_>) -> bool {
        let definition = self.effective();
        if entries.is_empty()
            || entries.contains_key(&ctx.config.option_key)
            || entries.keys().any(|k| definition.option(k).is_some())
            || definition.argument_map_option(entries).is_some()
        {
            return false;
        }
        if let Some(discriminator) = &definition.discriminator {
            if discriminator(Some(&AttrValue::Map(entries.clone())), ctx.parent).is_some() {
                return false;
            }
        }
        entries.values().all(|v| definition.is_option_shaped(v, ctx))
    }

    fn is_option_shaped(&self, value: &AttrValue, ctx: &ResolveContext<'_>) -> bool {
        if let Some(entries) = value.as_map() {
            if entries.contains_key(&ctx.config.option_key)
                || (entries.len() == 1 && entries.keys().all(|k| self.option(k).is_some()))
            {
                return true;
            }
        }
        self.discriminator
            .as_ref()
            .is_some_and(|discriminator| discriminator(Some(value), ctx.parent).is_some())
    }

    fn unknown_option(&self, option: &str) -> RiggingError {
        RiggingError::UnknownOption {
            component: self.name.clone(),
            option: option.to_owned(),
            allowed: self.option_names(),
        }
    }
}

impl fmt::Debug for DependencyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDefinition")
            .field("name", &self.name)
            .field("options", &self.option_names())
            .field("discriminator", &self.discriminator.is_some())
            .field("delegate", &self.delegate.as_ref().map(|d| d.name.clone()))
            .field("lazy", &self.lazy)
            .finish()
    }
}

fn definition_err(message: String) -> RiggingError {
    RiggingError::Definition { message }
}
