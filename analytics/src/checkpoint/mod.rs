//! Checkpoint store - persist named pipeline artifacts between stages.
//!
//! Each artifact is written as `<name>.csv` in the store directory, and a
//! `manifest.json` records its typed schema so it can be read back exactly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::{CheckpointError, CheckpointResult};
use crate::parser::{parse_with_schema, write_with_schema};
use crate::table::{Field, Schema, Table};

const MANIFEST_FILE: &str = "manifest.json";

/// Manifest entry for one stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCheckpoint {
    /// Artifact name (e.g. `cleaned_transactions`)
    pub name: String,
    /// File name inside the store directory
    pub file: String,
    pub columns: Vec<Field>,
    pub row_count: usize,
    /// RFC 3339 write time
    pub created_at: String,
}

/// Directory-backed store of named tables
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    manifest: BTreeMap<String, StoredCheckpoint>,
}

impl CheckpointStore {
    /// Open a store, creating the directory and loading any existing manifest.
    pub fn open(dir: impl AsRef<Path>) -> CheckpointResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)?;
            let entries: Vec<StoredCheckpoint> = serde_json::from_str(&content)?;
            entries.into_iter().map(|e| (e.name.clone(), e)).collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self { dir, manifest })
    }

    /// Stored artifacts, by name
    pub fn list(&self) -> Vec<&StoredCheckpoint> {
        self.manifest.values().collect()
    }

    pub fn get(&self, name: &str) -> Option<&StoredCheckpoint> {
        self.manifest.get(name)
    }

    /// Write `table` under `name`, replacing any earlier version.
    pub fn save(&mut self, name: &str, table: &Table) -> CheckpointResult<&StoredCheckpoint> {
        let file = format!("{}.csv", slug(name));
        let writer = BufWriter::new(fs::File::create(self.dir.join(&file))?);
        write_with_schema(table, writer)?;

        let entry = StoredCheckpoint {
            name: name.to_string(),
            file,
            columns: table.schema().fields().to_vec(),
            row_count: table.row_count(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.manifest.insert(name.to_string(), entry);
        self.write_manifest()?;

        self.manifest
            .get(name)
            .ok_or_else(|| CheckpointError::NotFound(name.to_string()))
    }

    /// Read a stored artifact back with its recorded schema.
    pub fn load(&self, name: &str) -> CheckpointResult<Table> {
        let entry = self
            .get(name)
            .ok_or_else(|| CheckpointError::NotFound(name.to_string()))?;

        let schema = Schema::new(entry.columns.clone())?;
        let content = fs::read_to_string(self.dir.join(&entry.file))?;
        if content.trim().is_empty() {
            return Ok(Table::empty(schema));
        }
        Ok(parse_with_schema(&content, ',', &schema)?)
    }

    fn write_manifest(&self) -> CheckpointResult<()> {
        let entries: Vec<&StoredCheckpoint> = self.manifest.values().collect();
        let content = serde_json::to_string_pretty(&entries)?;
        fs::write(self.dir.join(MANIFEST_FILE), content)?;
        Ok(())
    }
}

/// File-system safe form of an artifact name
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
