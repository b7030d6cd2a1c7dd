//! # rigging-common
//!
//! Shared value model, error definitions, configuration, and constants
//! used across the rigging workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod validation;
pub mod value;
