//! Conversion between attribute values and JSON.
//!
//! Dates and date-times do not survive plain JSON, so they are written as
//! `{"__type__": "Date" | "DateTime", "value": "<ISO 8601>"}` and turned
//! back into native values on read. Every other value maps one to one.

use chrono::{DateTime, NaiveDate, Utc};
use rigging_common::config::RiggingConfig;
use rigging_common::constants;
use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};
use serde_json::{Map, Number, Value};

/// Encodes a value, tagging temporal scalars.
#[must_use]
pub fn encode(value: &AttrValue, config: &RiggingConfig) -> Value {
    match value {
        AttrValue::Null => Value::Null,
        AttrValue::Bool(b) => Value::Bool(*b),
        AttrValue::Integer(n) => Value::Number(Number::from(*n)),
        AttrValue::Float(x) => Number::from_f64(*x).map_or(Value::Null, Value::Number),
        AttrValue::String(s) => Value::String(s.clone()),
        AttrValue::Date(d) => tag(constants::DATE_TYPE, d.format("%Y-%m-%d").to_string(), config),
        AttrValue::DateTime(t) => tag(constants::DATETIME_TYPE, t.to_rfc3339(), config),
        AttrValue::List(items) => Value::Array(items.iter().map(|v| encode(v, config)).collect()),
        AttrValue::Map(entries) => Value::Object(encode_map(entries, config)),
    }
}

/// Encodes every entry of a map.
#[must_use]
pub fn encode_map(entries: &AttributeMap, config: &RiggingConfig) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.clone(), encode(v, config)))
        .collect()
}

fn tag(type_name: &str, payload: String, config: &RiggingConfig) -> Value {
    let mut object = Map::new();
    let _ = object.insert(config.type_key.clone(), Value::String(type_name.to_owned()));
    let _ = object.insert(config.type_value_key.clone(), Value::String(payload));
    Value::Object(object)
}

/// Decodes a value, restoring tagged temporal scalars.
///
/// Objects whose type tag names an unknown type are kept as maps.
///
/// # Errors
///
/// Returns [`RiggingError::InvalidTag`] if a known type tag carries a
/// payload that does not parse.
pub fn decode(value: Value, config: &RiggingConfig) -> Result<AttrValue> {
    match value {
        Value::Null => Ok(AttrValue::Null),
        Value::Bool(b) => Ok(AttrValue::Bool(b)),
        Value::Number(n) => Ok(decode_number(&n)),
        Value::String(s) => Ok(AttrValue::String(s)),
        Value::Array(items) => items
            .into_iter()
            .map(|v| decode(v, config))
            .collect::<Result<Vec<_>>>()
            .map(AttrValue::List),
        Value::Object(object) => match untag(&object, config)? {
            Some(value) => Ok(value),
            None => decode_map(object, config).map(AttrValue::Map),
        },
    }
}

/// Decodes every entry of a JSON object.
///
/// # Errors
///
/// Returns an error under the same conditions as [`decode`].
pub fn decode_map(object: Map<String, Value>, config: &RiggingConfig) -> Result<AttributeMap> {
    object
        .into_iter()
        .map(|(k, v)| Ok((k, decode(v, config)?)))
        .collect()
}

fn decode_number(n: &Number) -> AttrValue {
    n.as_i64().map_or_else(
        || n.as_f64().map_or(AttrValue::Null, AttrValue::Float),
        AttrValue::Integer,
    )
}

fn untag(object: &Map<String, Value>, config: &RiggingConfig) -> Result<Option<AttrValue>> {
    if object.len() != 2 {
        return Ok(None);
    }
    let (Some(Value::String(type_name)), Some(Value::String(payload))) = (
        object.get(&config.type_key),
        object.get(&config.type_value_key),
    ) else {
        return Ok(None);
    };
    let invalid = || RiggingError::InvalidTag {
        type_name: type_name.clone(),
        value: payload.clone(),
    };
    match type_name.as_str() {
        constants::DATE_TYPE => NaiveDate::parse_from_str(payload, "%Y-%m-%d")
            .map(|d| Some(AttrValue::Date(d)))
            .map_err(|_| invalid()),
        constants::DATETIME_TYPE => DateTime::parse_from_rfc3339(payload)
            .map(|t| Some(AttrValue::DateTime(t.with_timezone(&Utc))))
            .map_err(|_| invalid()),
        _ => Ok(None),
    }
}
