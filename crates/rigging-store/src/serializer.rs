//! Host serialization to and from the configuration blob.
//!
//! Serialization dumps the host (plain attributes, `true` for associations,
//! `{option: attributes}` per dependency) and encodes it as tagged JSON.
//! Deserialization reverses the encoding, restores associations from the
//! record, runs class load hooks, and rebuilds the host through the same
//! resolution path. Restored attributes are committed without running
//! their transforms again.

use std::rc::Rc;

use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};
use rigging_core::dependency::{DependencyDefinition, ResolveContext};
use rigging_core::dump;
use rigging_core::host::{Host, HostDefinition, HostInput};
use rigging_core::store::AttributeStore;
use serde_json::Value;

use crate::codec;
use crate::record::ConfigurationRecord;

/// Serializes a host into a JSON value.
///
/// # Errors
///
/// Returns [`RiggingError::Serialization`] if a dependency instance matches
/// no option of its definition.
pub fn to_value(host: &Host) -> Result<Value> {
    let dumped = dump::dump_host(host)?;
    Ok(codec::encode(&dumped, host.definition().config()))
}

/// Serializes a host into a JSON string.
///
/// # Errors
///
/// Returns an error under the same conditions as [`to_value`].
pub fn serialize(host: &Host) -> Result<String> {
    let json = serde_json::to_string(&to_value(host)?)?;
    tracing::debug!(host = %host.definition().name(), bytes = json.len(), "serialized host");
    Ok(json)
}

/// Restores the attribute map a host is constructed from.
///
/// Association sentinels are replaced by the record's live association
/// (or dropped when there is none). Dependencies whose selected class
/// declares a load hook are rewritten through it.
///
/// # Errors
///
/// Returns an error if the blob is not a JSON object, a type tag is
/// invalid, an association cannot be read, or a load hook fails.
pub fn restore_attributes<R>(
    definition: &HostDefinition,
    json: &str,
    record: Option<&R>,
) -> Result<AttributeMap>
where
    R: ConfigurationRecord + ?Sized,
{
    let config = definition.config();
    let Value::Object(object) = serde_json::from_str::<Value>(json)? else {
        return Err(RiggingError::InvalidInput {
            component: definition.name().to_owned(),
            message: "configuration blob must be a JSON object".into(),
        });
    };
    let mut attributes = codec::decode_map(object, config)?;

    for association in definition.associations() {
        if attributes.remove(&association.name).is_none() {
            continue;
        }
        let restored = match record {
            Some(record) => record.read_association(association)?,
            None => None,
        };
        if let Some(value) = restored {
            let _ = attributes.insert(association.name.clone(), value);
        }
    }

    let parent = parent_store(definition, &attributes)?;
    let ctx = ResolveContext::new(&parent, config).restoring(true);
    for dependency in definition.dependencies() {
        if let Some(value) = attributes.remove(dependency.name()) {
            let value = apply_load_hooks(dependency, value, &ctx)?;
            let _ = attributes.insert(dependency.name().to_owned(), value);
        }
    }
    Ok(attributes)
}

/// Rebuilds a host from a configuration blob.
///
/// # Errors
///
/// Returns an error if restoring the attributes or constructing the host
/// fails.
pub fn deserialize<R>(definition: &Rc<HostDefinition>, json: &str, record: Option<&R>) -> Result<Host>
where
    R: ConfigurationRecord + ?Sized,
{
    let attributes = restore_attributes(definition, json, record)?;
    tracing::debug!(host = %definition.name(), attributes = attributes.len(), "deserializing host");
    Host::new(definition, HostInput::from_map(definition, attributes).restored())
}

fn parent_store(definition: &HostDefinition, attributes: &AttributeMap) -> Result<AttributeStore> {
    let mut store = AttributeStore::new(definition.name(), definition.schema());
    for (name, value) in attributes {
        if store.declares(name) {
            let _ = store.set(name, value.clone())?;
        }
    }
    Ok(store)
}

fn apply_load_hooks(
    definition: &DependencyDefinition,
    value: AttrValue,
    ctx: &ResolveContext<'_>,
) -> Result<AttrValue> {
    match value {
        AttrValue::List(items) => items
            .into_iter()
            .map(|item| apply_load_hooks(definition, item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(AttrValue::List),
        AttrValue::Map(entries) if definition.is_named_collection(&entries, ctx) => entries
            .into_iter()
            .map(|(key, item)| Ok((key, apply_load_hooks(definition, item, ctx)?)))
            .collect::<Result<AttributeMap>>()
            .map(AttrValue::Map),
        scalar => {
            let Some((option, args)) = definition.select_option(Some(scalar.clone()), ctx)? else {
                return Ok(scalar);
            };
            if !option.class().has_deserialize() {
                return Ok(scalar);
            }
            tracing::debug!(
                component = %definition.name(),
                option = %option.name(),
                class = %option.class_name(),
                "applying load hook"
            );
            let restored = option.class().deserialize(AttrValue::Map(args))?;
            Ok(AttrValue::map([(option.name(), restored)]))
        }
    }
}
