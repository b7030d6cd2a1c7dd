//! # rigging-core
//!
//! Declarative dependency wiring for configurable hosts.
//!
//! Handles:
//! - **Attribute**: bound attributes with defaults, sources, and transforms.
//! - **Store**: per-object attribute values with change tracking.
//! - **Class**: the explicit registry of constructible component classes.
//! - **Option / Dependency**: polymorphic dependency slots and the
//!   resolution algorithm that picks and builds an implementation.
//! - **Factory**: reusable bundles of dependency definitions.
//! - **Host**: host definitions, instances, and live attribute propagation.
//! - **Dump / Validation**: structural dumps and dependency validation.

pub mod attribute;
pub mod class;
pub mod component;
pub mod dependency;
pub mod dump;
pub mod factory;
pub mod graph;
pub mod host;
pub mod input;
pub mod option;
pub mod store;
pub mod validation;
