//! # rigging-store
//!
//! Persistence boundary for rigging hosts.
//!
//! Handles:
//! - **Codec**: attribute values to JSON, with type tags for dates and
//!   date-times.
//! - **Serializer**: host dump to a configuration blob and back, restoring
//!   associations and running class load hooks.
//! - **Record**: the configuration-record trait, in-memory and file-backed
//!   records, and the save/load lifecycle hooks.

pub mod codec;
pub mod record;
pub mod serializer;
