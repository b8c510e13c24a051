use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Storage format of a catalog table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// Header row followed by data rows; every cell is read as text
    Csv,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    None,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Gzip => ".gz",
            Compression::None => "",
        }
    }
}

/// What a sink does to the catalog when it writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateBehavior {
    /// Create or update the table entry with the written schema and location
    #[default]
    UpdateInDatabase,
    /// Leave the catalog as is and only log the schema that would have been registered
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub location: PathBuf,
    pub format: TableFormat,
    #[serde(default)]
    pub compression: Option<Compression>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    #[serde(default)]
    pub tables: BTreeMap<String, TableEntry>,
}

/// Contents of `catalog.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
}

impl CatalogDocument {
    pub fn table(&self, database: &str, table: &str) -> Option<&TableEntry> {
        self.databases.get(database)?.tables.get(table)
    }

    pub fn upsert(&mut self, database: &str, table: &str, entry: TableEntry) {
        self.databases
            .entry(database.to_string())
            .or_default()
            .tables
            .insert(table.to_string(), entry);
    }
}
