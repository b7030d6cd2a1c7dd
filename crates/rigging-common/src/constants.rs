//! Wire-level constants and defaults.

/// Default key naming the option in an explicit `{option, value}` envelope.
pub const DEFAULT_OPTION_KEY: &str = "option";

/// Default key holding the constructor input in an explicit envelope.
pub const DEFAULT_VALUE_KEY: &str = "value";

/// Default key carrying the type name of a tagged scalar.
pub const DEFAULT_TYPE_KEY: &str = "__type__";

/// Default key carrying the payload of a tagged scalar.
pub const DEFAULT_TYPE_VALUE_KEY: &str = "value";

/// Attribute name reserved for storage primary keys.
pub const PRIMARY_KEY: &str = "id";

/// Name of the option synthesized for a single-implementation dependency.
pub const SYNTHETIC_OPTION: &str = "default";

/// Type name used to tag date-time values.
pub const DATETIME_TYPE: &str = "DateTime";

/// Type name used to tag calendar dates.
pub const DATE_TYPE: &str = "Date";
