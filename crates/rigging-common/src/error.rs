//! Unified error types for the rigging workspace.
//!
//! Definition errors surface while a host definition is built; resolution
//! and attribute errors surface from host construction and assignment;
//! serialization errors surface at save time. Every variant names the
//! component, option, or attribute that caused it.

use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum RiggingError {
    /// A definition is internally inconsistent.
    #[error("invalid definition: {message}")]
    Definition {
        /// Description of the inconsistency.
        message: String,
    },

    /// A class identifier is not present in the class registry.
    #[error("unknown component class \"{name}\"")]
    UnknownClass {
        /// Identifier that failed to resolve.
        name: String,
    },

    /// An option name (or injected class) matches no registered option.
    #[error("unknown option \"{option}\" for {component}; expected one of: {}", allowed.join(", "))]
    UnknownOption {
        /// Dependency being resolved.
        component: String,
        /// Offending option name or key.
        option: String,
        /// Registered option names.
        allowed: Vec<String>,
    },

    /// Input was absent and nothing could select an option.
    #[error("don't know how to build {component}: no default option and no discriminator match")]
    NoDefault {
        /// Dependency being resolved.
        component: String,
    },

    /// Input has a shape the dependency cannot use.
    #[error("invalid input for {component}: {message}")]
    InvalidInput {
        /// Dependency being resolved.
        component: String,
        /// Description of the problem.
        message: String,
    },

    /// A reserved attribute name was about to reach a constructor.
    #[error("attribute \"{name}\" is reserved and cannot be bound to {component} option \"{option}\"")]
    ReservedAttribute {
        /// Dependency being resolved.
        component: String,
        /// Option whose constructor arguments contained the name.
        option: String,
        /// Reserved name.
        name: String,
    },

    /// Assignment of an attribute the owner does not declare.
    #[error("unknown attribute \"{name}\" for {owner}")]
    UnknownAttribute {
        /// Host or component owning the attribute store.
        owner: String,
        /// Offending attribute name.
        name: String,
    },

    /// Access to a dependency or delegated method the host does not declare.
    #[error("{host} has no dependency or delegate named \"{name}\"")]
    UnknownDependency {
        /// Host definition name.
        host: String,
        /// Requested name.
        name: String,
    },

    /// A component constructor failed.
    #[error("failed to construct {class}: {message}")]
    Construction {
        /// Class identifier.
        class: String,
        /// Description of the failure.
        message: String,
    },

    /// A live instance matches no option of its dependency.
    #[error("don't know how to serialize {component}: class \"{class}\" matches no option")]
    Serialization {
        /// Dependency being serialized.
        component: String,
        /// Runtime class of the instance.
        class: String,
    },

    /// A type-tagged value could not be restored.
    #[error("invalid {type_name} value: {value}")]
    InvalidTag {
        /// Declared type name of the tag.
        type_name: String,
        /// Raw tagged payload.
        value: String,
    },

    /// Strict validation found errors.
    #[error("validation failed: {}", errors.full_messages().join("; "))]
    Invalid {
        /// Collected validation errors.
        errors: ValidationErrors,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {source}")]
    Json {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, RiggingError>;
