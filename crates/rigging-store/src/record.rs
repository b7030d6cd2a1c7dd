//! Persistence records and the save/load lifecycle hooks.
//!
//! A record stores one host's configuration blob next to its typed
//! columns. [`save`] is the before-save hook and [`load`] the after-load
//! hook; both go through the serializer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rigging_common::error::{Result, RiggingError};
use rigging_common::value::{AttrValue, AttributeMap};
use rigging_core::host::{Association, Host, HostDefinition, HostInput};
use uuid::Uuid;

use crate::serializer;

/// Storage for one host's configuration blob.
pub trait ConfigurationRecord {
    /// Reads the stored blob, `None` when nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn read_configuration_blob(&self) -> Result<Option<String>>;

    /// Replaces the stored blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn write_configuration_blob(&mut self, blob: String) -> Result<()>;

    /// Reads the live value of an association, if the record has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the related record cannot be read.
    fn read_association(&self, association: &Association) -> Result<Option<AttrValue>> {
        let _ = association;
        Ok(None)
    }
}

/// An in-memory record with typed columns and related tables.
///
/// Associations are looked up in the related table named after the
/// association, keyed by the value of its foreign-key column.
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    id: Uuid,
    blob: Option<String>,
    columns: AttributeMap,
    related: BTreeMap<String, BTreeMap<String, AttrValue>>,
}

impl MemoryRecord {
    /// Creates an empty record with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            blob: None,
            columns: AttributeMap::new(),
            related: BTreeMap::new(),
        }
    }

    /// Record identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Stored blob.
    #[must_use]
    pub fn blob(&self) -> Option<&str> {
        self.blob.as_deref()
    }

    /// Typed column value.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&AttrValue> {
        self.columns.get(name)
    }

    /// Sets a typed column.
    pub fn set_column(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let _ = self.columns.insert(name.into(), value.into());
    }

    /// Adds a row to the related table `table` under `key`.
    pub fn relate(&mut self, table: impl Into<String>, key: impl Into<AttrValue>, row: AttrValue) {
        let _ = self
            .related
            .entry(table.into())
            .or_default()
            .insert(row_key(&key.into()), row);
    }
}

impl Default for MemoryRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationRecord for MemoryRecord {
    fn read_configuration_blob(&self) -> Result<Option<String>> {
        Ok(self.blob.clone())
    }

    fn write_configuration_blob(&mut self, blob: String) -> Result<()> {
        self.blob = Some(blob);
        Ok(())
    }

    fn read_association(&self, association: &Association) -> Result<Option<AttrValue>> {
        let Some(key) = self.columns.get(&association.foreign_key) else {
            return Ok(None);
        };
        Ok(self
            .related
            .get(&association.name)
            .and_then(|table| table.get(&row_key(key)))
            .cloned())
    }
}

fn row_key(value: &AttrValue) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_owned)
}

/// A record whose blob lives in a JSON file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    path: PathBuf,
}

impl FileRecord {
    /// Opens the record stored at `path`; the file need not exist yet.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        tracing::debug!(path = %path.display(), "opening file record");
        Self { path }
    }

    /// Location of the blob.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigurationRecord for FileRecord {
    fn read_configuration_blob(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        std::fs::read_to_string(&self.path)
            .map(Some)
            .map_err(|e| RiggingError::Io {
                path: self.path.clone(),
                source: e,
            })
    }

    fn write_configuration_blob(&mut self, blob: String) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RiggingError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, blob).map_err(|e| RiggingError::Io {
            path: staging.clone(),
            source: e,
        })?;
        std::fs::rename(&staging, &self.path).map_err(|e| RiggingError::Io {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Serializes `host` into `record` and clears its change set.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save<R>(host: &mut Host, record: &mut R) -> Result<()>
where
    R: ConfigurationRecord + ?Sized,
{
    let blob = serializer::serialize(host)?;
    let changed = host.changes().count();
    record.write_configuration_blob(blob)?;
    host.clear_changes();
    tracing::info!(host = %host.definition().name(), changed, "saved host configuration");
    Ok(())
}

/// Rebuilds a host from `record`; an empty record yields a host built from
/// defaults.
///
/// # Errors
///
/// Returns an error if the blob cannot be read or deserialized.
pub fn load<R>(definition: &Rc<HostDefinition>, record: &R) -> Result<Host>
where
    R: ConfigurationRecord + ?Sized,
{
    let host = match record.read_configuration_blob()? {
        Some(blob) => serializer::deserialize(definition, &blob, Some(record))?,
        None => Host::new(definition, HostInput::new())?,
    };
    tracing::info!(host = %definition.name(), "loaded host configuration");
    Ok(host)
}
