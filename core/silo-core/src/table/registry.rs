//! Column registry and the on-disk manifest.
//!
//! The registry is the table's ordered mapping from column name to shared
//! column handle. `names` is the order of record; the map never disagrees
//! with it. Structural changes set a dirty flag; [`ColumnRegistry::persist`]
//! writes the manifest only when the flag is set and clears it.
//!
//! Manifest format: `__manifest__.json` under the table root, a JSON object
//! `{"names": [...]}` terminated by a newline, written atomically via a
//! temporary file and rename.

use crate::error::{SiloError, SiloResult};
use crate::query::NROW_COLUMN;
use crate::storage::{ColumnStore, SharedColumn, shared};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub(crate) const MANIFEST_FILE: &str = "__manifest__.json";

/// Words the predicate grammar claims; a column with one of these names
/// could never be referenced in an expression.
const RESERVED_WORDS: &[&str] = &[
    "and", "or", "not", "true", "false", "null", "is", "in", "like", "where", "select",
];

#[derive(Serialize, Deserialize)]
struct Manifest {
    names: Vec<String>,
}

/// Insertion-ordered name → column mapping with manifest persistence.
#[derive(Debug, Default)]
pub struct ColumnRegistry {
    names: Vec<String>,
    cols: AHashMap<String, SharedColumn>,
    dirty: bool,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a table root: read the manifest, open every
    /// named column from `<root>/<name>/`.
    pub fn load(rootdir: &Path, read_only: bool) -> SiloResult<Self> {
        let path = rootdir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(SiloError::RootDirMissing(rootdir.display().to_string()));
        }
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&path)?)?;

        let mut registry = Self::new();
        for name in manifest.names {
            let store = ColumnStore::open(rootdir.join(&name), read_only)?;
            registry.cols.insert(name.clone(), shared(store));
            registry.names.push(name);
        }
        Ok(registry)
    }

    /// Write the manifest if anything changed since the last persist.
    pub fn persist(&mut self, rootdir: Option<&Path>) -> SiloResult<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(dir) = rootdir {
            let manifest = Manifest {
                names: self.names.clone(),
            };
            let mut json = serde_json::to_string(&manifest)?;
            json.push('\n');
            let path = dir.join(MANIFEST_FILE);
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json.as_bytes())?;
            fs::rename(&tmp, &path)?;
            debug!(ncols = self.names.len(), "wrote manifest");
        }
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cols.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&SharedColumn> {
        self.cols.get(name)
    }

    /// Column order of record.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn pos(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name_at(&self, pos: usize) -> Option<&str> {
        self.names.get(pos).map(String::as_str)
    }

    /// Ordered iteration over (name, column).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedColumn)> {
        self.names.iter().map(|n| {
            // names and cols move in lockstep
            (n.as_str(), &self.cols[n])
        })
    }

    /// Register a new column at the end of the order.
    pub fn push(&mut self, name: impl Into<String>, col: SharedColumn) -> SiloResult<()> {
        let name = name.into();
        self.validate_new_name(&name)?;
        self.names.push(name.clone());
        self.cols.insert(name, col);
        self.dirty = true;
        Ok(())
    }

    /// Register a new column at `pos`, shifting the rest right.
    pub fn insert_at(
        &mut self,
        pos: usize,
        name: impl Into<String>,
        col: SharedColumn,
    ) -> SiloResult<()> {
        let name = name.into();
        if pos > self.names.len() {
            return Err(SiloError::Validation(format!(
                "position {pos} out of range for {} columns",
                self.names.len()
            )));
        }
        self.validate_new_name(&name)?;
        self.names.insert(pos, name.clone());
        self.cols.insert(name, col);
        self.dirty = true;
        Ok(())
    }

    /// Unregister a column, returning its handle.
    pub fn remove(&mut self, name: &str) -> SiloResult<SharedColumn> {
        let col = self
            .cols
            .remove(name)
            .ok_or_else(|| SiloError::ColumnNotFound(name.to_string()))?;
        self.names.retain(|n| n != name);
        self.dirty = true;
        Ok(col)
    }

    fn validate_new_name(&self, name: &str) -> SiloResult<()> {
        validate_column_name(name)?;
        if self.contains(name) {
            return Err(SiloError::ColumnExists(name.to_string()));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Check a column name: bare identifier, not a reserved word, not the
/// `nrow__` pseudo-column.
pub fn validate_column_name(name: &str) -> SiloResult<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SiloError::ColumnName {
            name: name.to_string(),
            reason: "must be a bare identifier ([A-Za-z_][A-Za-z0-9_]*)".to_string(),
        });
    }
    if name == NROW_COLUMN {
        return Err(SiloError::ColumnName {
            name: name.to_string(),
            reason: "reserved for the row-offset pseudo-column".to_string(),
        });
    }
    if RESERVED_WORDS.contains(&name.to_ascii_lowercase().as_str()) {
        return Err(SiloError::ColumnName {
            name: name.to_string(),
            reason: "reserved word in the expression grammar".to_string(),
        });
    }
    Ok(())
}
