//! User metadata attached to a table.
//!
//! Attrs are a small string → JSON value map. On a disk-backed table every
//! mutation rewrites `__attrs__.json` immediately (atomic tmp + rename), so
//! attrs survive even without an explicit flush. Memory tables keep them
//! in memory only.

use crate::error::{SiloError, SiloResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

pub(crate) const ATTRS_FILE: &str = "__attrs__.json";

/// Persistent user metadata.
#[derive(Debug)]
pub struct Attrs {
    data: BTreeMap<String, Value>,
    path: Option<PathBuf>,
    read_only: bool,
}

impl Attrs {
    /// In-memory attrs.
    pub(crate) fn new_memory() -> Self {
        Self {
            data: BTreeMap::new(),
            path: None,
            read_only: false,
        }
    }

    /// Fresh disk-backed attrs under a table root.
    pub(crate) fn new_disk(rootdir: &std::path::Path) -> Self {
        Self {
            data: BTreeMap::new(),
            path: Some(rootdir.join(ATTRS_FILE)),
            read_only: false,
        }
    }

    /// Load attrs from a table root; a missing file means no attrs yet.
    pub(crate) fn load(rootdir: &std::path::Path, read_only: bool) -> SiloResult<Self> {
        let path = rootdir.join(ATTRS_FILE);
        let data = if path.is_file() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            data,
            path: Some(path),
            read_only,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set one attr; disk-backed attrs persist immediately.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> SiloResult<()> {
        if self.read_only {
            return Err(SiloError::ReadOnly);
        }
        self.data.insert(key.into(), value.into());
        self.persist()
    }

    /// Remove one attr; disk-backed attrs persist immediately.
    pub fn remove(&mut self, key: &str) -> SiloResult<Option<Value>> {
        if self.read_only {
            return Err(SiloError::ReadOnly);
        }
        let old = self.data.remove(key);
        if old.is_some() {
            self.persist()?;
        }
        Ok(old)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub(crate) fn persist(&self) -> SiloResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut json = serde_json::to_string_pretty(&self.data)?;
        json.push('\n');
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes())?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Copy the raw map (table copy and the Parquet bridge use this).
    pub(crate) fn to_map(&self) -> BTreeMap<String, Value> {
        self.data.clone()
    }

    /// Bulk-restore attrs, persisting once at the end.
    pub(crate) fn restore(&mut self, data: BTreeMap<String, Value>) -> SiloResult<()> {
        if self.read_only {
            return Err(SiloError::ReadOnly);
        }
        self.data = data;
        self.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_attrs_round_trip() {
        let mut attrs = Attrs::new_memory();
        attrs.set("owner", "ops").unwrap();
        attrs.set("version", json!(3)).unwrap();
        assert_eq!(attrs.get("owner"), Some(&json!("ops")));
        assert_eq!(attrs.len(), 2);
        attrs.remove("owner").unwrap();
        assert!(attrs.get("owner").is_none());
    }

    #[test]
    fn disk_attrs_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut attrs = Attrs::new_disk(dir.path());
        attrs.set("note", json!({"a": [1, 2]})).unwrap();

        let reloaded = Attrs::load(dir.path(), false).unwrap();
        assert_eq!(reloaded.get("note"), Some(&json!({"a": [1, 2]})));
    }

    #[test]
    fn read_only_attrs_refuse_writes() {
        let dir = tempfile::tempdir().unwrap();
        let mut attrs = Attrs::new_disk(dir.path());
        attrs.set("k", json!(1)).unwrap();

        let mut frozen = Attrs::load(dir.path(), true).unwrap();
        assert!(matches!(frozen.set("k", json!(2)), Err(SiloError::ReadOnly)));
        assert!(matches!(frozen.remove("k"), Err(SiloError::ReadOnly)));
        assert_eq!(frozen.get("k"), Some(&json!(1)));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let attrs = Attrs::load(dir.path(), false).unwrap();
        assert!(attrs.is_empty());
    }
}
