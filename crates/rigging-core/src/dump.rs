//! Structural dump of a host into a plain value tree.
//!
//! Plain attributes are compacted. Association attributes become `true`.
//! Each dependency becomes `{option: attributes}`, keeping the shape of its
//! graph entry. Realized instances are dumped under the option recorded
//! when they were resolved. Lazy dependencies that were never resolved dump the option
//! their input selects, without constructing anything.

use std::collections::BTreeMap;

use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap, compact_map};

use crate::component::SharedComponent;
use crate::dependency::{DependencyDefinition, ResolveContext};
use crate::graph::{Binding, Realized};
use crate::host::Host;
use crate::input::DependencyValue;

/// Dumps a host's attributes and dependencies.
///
/// # Errors
///
/// Returns [`RiggingError::Serialization`] if a dependency instance matches
/// no option of its definition, or an error if pending input selects no
/// usable option.
pub fn dump_host(host: &Host) -> Result<AttrValue> {
    let definition = host.definition();
    let mut plain = host.store().to_map();
    let mut associations = AttributeMap::new();
    for association in definition.associations() {
        if let Some(value) = plain.remove(&association.name) {
            if !value.is_blank() {
                let _ = associations.insert(association.name.clone(), AttrValue::Bool(true));
            }
        }
    }

    let mut out = compact_map(plain);
    out.extend(associations);
    let ctx = ResolveContext::new(host.store(), definition.config());
    for dependency in definition.dependencies() {
        let name = dependency.name();
        let dumped = match host.built_dependency(name) {
            Some(realized) => Some(dump_realized(dependency, realized)?),
            None => match host.pending(name) {
                Some(value) => dump_input(dependency, value, &ctx)?,
                None => None,
            },
        };
        if let Some(value) = dumped {
            let _ = out.insert(name.to_owned(), value);
        }
    }
    Ok(AttrValue::Map(out))
}

/// Dumps one graph entry, keeping its shape.
///
/// # Errors
///
/// Returns [`RiggingError::Serialization`] if an instance matches no option.
pub fn dump_realized(definition: &DependencyDefinition, realized: &Realized) -> Result<AttrValue> {
    match realized {
        Realized::Single(binding) => dump_binding(binding),
        Realized::List(bindings) => bindings
            .iter()
            .map(dump_binding)
            .collect::<Result<Vec<_>>>()
            .map(AttrValue::List),
        Realized::Keyed(bindings) => bindings
            .iter()
            .map(|(key, b)| Ok((key.clone(), dump_binding(b)?)))
            .collect::<Result<BTreeMap<_, _>>>()
            .map(AttrValue::Map),
    }
}

/// Dumps one binding under the option it was resolved with.
///
/// # Errors
///
/// Returns an error raised by the instance's own serialization.
pub fn dump_binding(binding: &Binding) -> Result<AttrValue> {
    envelope(binding.option().name(), binding.instance())
}

/// Dumps an unbound instance as `{option: attributes}`, the option being
/// found by the instance's class.
///
/// # Errors
///
/// Returns [`RiggingError::Serialization`] if the class matches no option,
/// an error if it matches several, or an error raised by the instance's own
/// serialization.
pub fn dump_instance(definition: &DependencyDefinition, instance: &SharedComponent) -> Result<AttrValue> {
    let class = instance.borrow().class_name().to_owned();
    let option = definition
        .option_for_class(&class)?
        .ok_or_else(|| RiggingError::Serialization {
            component: definition.name().to_owned(),
            class,
        })?;
    envelope(option.name(), instance)
}

fn envelope(option: &str, instance: &SharedComponent) -> Result<AttrValue> {
    let instance = instance.borrow();
    let inner = match instance.serialize()? {
        Some(value) => value,
        None => AttrValue::Map(compact_map(instance.attributes())),
    };
    Ok(AttrValue::map([(option, inner)]))
}

fn dump_input(
    definition: &DependencyDefinition,
    value: &DependencyValue,
    ctx: &ResolveContext<'_>,
) -> Result<Option<AttrValue>> {
    let dumped = match value {
        DependencyValue::Absent => None,
        DependencyValue::Instance(instance) => Some(dump_instance(definition, instance)?),
        DependencyValue::List(items) => Some(dump_inputs(definition, items.iter(), ctx)?),
        DependencyValue::Value(AttrValue::List(items)) => {
            let items: Vec<DependencyValue> = items.iter().cloned().map(DependencyValue::Value).collect();
            Some(dump_inputs(definition, items.iter(), ctx)?)
        }
        DependencyValue::Keyed(entries) => Some(dump_keyed(
            definition,
            entries.iter().map(|(k, v)| (k.clone(), v.clone())),
            ctx,
        )?),
        DependencyValue::Value(AttrValue::Map(entries)) if definition.is_named_collection(entries, ctx) => {
            Some(dump_keyed(
                definition,
                entries.iter().map(|(k, v)| (k.clone(), DependencyValue::Value(v.clone()))),
                ctx,
            )?)
        }
        DependencyValue::Value(raw) => definition
            .select_option(Some(raw.clone()), ctx)?
            .map(|(option, args)| AttrValue::map([(option.name(), AttrValue::Map(compact_map(args)))])),
    };
    Ok(dumped)
}

fn dump_inputs<'a>(
    definition: &DependencyDefinition,
    items: impl Iterator<Item = &'a DependencyValue>,
    ctx: &ResolveContext<'_>,
) -> Result<AttrValue> {
    let mut out = Vec::new();
    for item in items {
        out.extend(dump_input(definition, item, ctx)?);
    }
    Ok(AttrValue::List(out))
}

fn dump_keyed(
    definition: &DependencyDefinition,
    entries: impl Iterator<Item = (String, DependencyValue)>,
    ctx: &ResolveContext<'_>,
) -> Result<AttrValue> {
    let mut out = AttributeMap::new();
    for (key, item) in entries {
        if let Some(value) = dump_input(definition, &item, ctx)? {
            let _ = out.insert(key, value);
        }
    }
    Ok(AttrValue::Map(out))
}
