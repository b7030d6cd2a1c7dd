//! Configuration model for the rigging engine.

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, RiggingError};

/// Wire-level settings shared by resolution and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiggingConfig {
    /// Key naming the option in an explicit `{option, value}` envelope.
    pub option_key: String,
    /// Key holding the constructor input in an explicit envelope.
    pub value_key: String,
    /// Key carrying the type name of a tagged scalar.
    pub type_key: String,
    /// Key carrying the payload of a tagged scalar.
    pub type_value_key: String,
    /// Names that may never be passed to a dependency constructor.
    pub reserved_attributes: Vec<String>,
}

impl Default for RiggingConfig {
    fn default() -> Self {
        Self {
            option_key: constants::DEFAULT_OPTION_KEY.to_owned(),
            value_key: constants::DEFAULT_VALUE_KEY.to_owned(),
            type_key: constants::DEFAULT_TYPE_KEY.to_owned(),
            type_value_key: constants::DEFAULT_TYPE_VALUE_KEY.to_owned(),
            reserved_attributes: vec![constants::PRIMARY_KEY.to_owned()],
        }
    }
}

impl RiggingConfig {
    /// Parses an override document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON or fails
    /// [`RiggingConfig::validate`].
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings are usable together.
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope keys collide, a key is empty, or
    /// the primary key is no longer reserved.
    pub fn validate(&self) -> Result<()> {
        let keys = [
            ("option_key", &self.option_key),
            ("value_key", &self.value_key),
            ("type_key", &self.type_key),
            ("type_value_key", &self.type_value_key),
        ];
        if let Some((field, _)) = keys.iter().find(|(_, key)| key.is_empty()) {
            return Err(config_err(format!("{field} must not be empty")));
        }
        if self.option_key == self.value_key {
            return Err(config_err(format!(
                "option_key and value_key must differ (both \"{}\")",
                self.option_key
            )));
        }
        if self.type_key == self.type_value_key {
            return Err(config_err(format!(
                "type_key and type_value_key must differ (both \"{}\")",
                self.type_key
            )));
        }
        if !self.is_reserved(constants::PRIMARY_KEY) {
            return Err(config_err(format!(
                "reserved_attributes must contain \"{}\"",
                constants::PRIMARY_KEY
            )));
        }
        Ok(())
    }

    /// Whether `name` may not be passed to a constructor.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_attributes.iter().any(|r| r == name)
    }
}

fn config_err(message: String) -> RiggingError {
    RiggingError::Definition {
        message: format!("invalid configuration: {message}"),
    }
}
