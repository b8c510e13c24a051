use async_trait::async_trait;
use chrono::Utc;
use flate2::read::GzDecoder;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::app::ports::SourcePort;
use crate::domain::{CatalogDocument, Frame, TableEntry, TableFormat, UpdateBehavior};
use crate::error::{EtlError, Result};

const CATALOG_FILE: &str = "catalog.json";

/// File-backed data catalog: `<root>/catalog.json` maps databases and tables
/// to their location and format.
///
/// Relative table locations resolve against the catalog root. A location may
/// be a single file or a directory of part files; names starting with `_` or
/// `.` inside a directory are bookkeeping and are skipped.
pub struct LocalCatalog {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalCatalog {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    /// Current catalog contents; a catalog that was never written is empty
    pub fn load(&self) -> Result<CatalogDocument> {
        let path = self.catalog_path();
        if !path.exists() {
            return Ok(CatalogDocument::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, doc: &CatalogDocument) -> Result<()> {
        let path = self.catalog_path();
        let tmp = self.root.join(format!(".{}.tmp", CATALOG_FILE));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(doc)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn table(&self, database: &str, table: &str) -> Result<TableEntry> {
        self.load()?
            .table(database, table)
            .cloned()
            .ok_or_else(|| EtlError::TableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }

    /// Register `entry` under `database.table` according to `behavior`
    pub fn register_table(
        &self,
        database: &str,
        table: &str,
        mut entry: TableEntry,
        behavior: UpdateBehavior,
    ) -> Result<()> {
        match behavior {
            UpdateBehavior::UpdateInDatabase => {
                let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
                let mut doc = self.load()?;
                entry.updated_at = Some(Utc::now());
                doc.upsert(database, table, entry);
                self.save(&doc)?;
                info!("Registered {}.{} in catalog {}", database, table, self.catalog_path().display());
            }
            UpdateBehavior::Log => {
                info!(
                    "Catalog update disabled for {}.{}; schema would be [{}] at {}",
                    database,
                    table,
                    entry.columns.join(", "),
                    entry.location.display()
                );
            }
        }
        Ok(())
    }

    fn resolve(&self, location: &Path) -> PathBuf {
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.root.join(location)
        }
    }

    fn data_files(&self, location: &Path) -> Result<Vec<PathBuf>> {
        if location.is_file() {
            return Ok(vec![location.to_path_buf()]);
        }
        if !location.is_dir() {
            return Err(EtlError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("table location {} does not exist", location.display()),
            )));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(location)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| !n.starts_with('_') && !n.starts_with('.'))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        Ok(files)
    }

    /// Read a table into a frame.
    ///
    /// The schema comes from the CSV header rows. When a table yields neither
    /// headers nor rows, the columns registered in the catalog are used, so an
    /// empty table still carries its schema.
    pub fn read_table_sync(&self, database: &str, table: &str) -> Result<Frame> {
        let entry = self.table(database, table)?;
        let location = self.resolve(&entry.location);

        let mut schema: Vec<String> = Vec::new();
        let mut objects: Vec<Map<String, Value>> = Vec::new();
        for file in self.data_files(&location)? {
            debug!("Reading {} as {:?}", file.display(), entry.format);
            let reader = open_maybe_gzip(&file)?;
            match entry.format {
                TableFormat::Csv => read_csv(reader, &mut schema, &mut objects)?,
                TableFormat::Json => read_json_lines(reader, &mut objects)?,
            }
        }

        if schema.is_empty() && objects.is_empty() {
            schema = entry.columns;
        }
        Ok(Frame::from_objects(schema, objects))
    }
}

fn open_maybe_gzip(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let is_gzip = path.extension().and_then(|e| e.to_str()) == Some("gz");
    if is_gzip {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// CSV cells are read as text; an empty cell is `Null`. Header names not yet
/// in `schema` are appended to it.
fn read_csv(reader: Box<dyn Read>, schema: &mut Vec<String>, out: &mut Vec<Map<String, Value>>) -> Result<()> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).flexible(false).from_reader(reader);
    let headers: Vec<String> = csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    for name in &headers {
        if !schema.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            schema.push(name.clone());
        }
    }

    for record in csv_reader.records() {
        let record = record?;
        let mut obj = Map::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::String(cell.to_string())
            };
            obj.insert(name.clone(), value);
        }
        out.push(obj);
    }
    Ok(())
}

fn read_json_lines(reader: Box<dyn Read>, out: &mut Vec<Map<String, Value>>) -> Result<()> {
    for line in BufReader::new(reader).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(&line)?);
    }
    Ok(())
}

#[async_trait]
impl SourcePort for LocalCatalog {
    async fn read_table(&self, database: &str, table: &str) -> Result<Frame> {
        self.read_table_sync(database, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn csv_entry(location: &str) -> TableEntry {
        TableEntry {
            location: PathBuf::from(location),
            format: TableFormat::Csv,
            compression: None,
            columns: Vec::new(),
            updated_at: None,
        }
    }

    #[test]
    fn reads_registered_csv_table() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("raw.csv"), "cashtag,%chg,NAME\n$AAA,-1.25%,\n$BBB,0.5%,Bravo\n").unwrap();

        let catalog = LocalCatalog::open(dir.path()).unwrap();
        catalog
            .register_table("db", "raw", csv_entry("raw.csv"), UpdateBehavior::UpdateInDatabase)
            .unwrap();

        let frame = catalog.read_table_sync("db", "raw").unwrap();
        assert_eq!(frame.columns(), &["cashtag".to_string(), "%chg".to_string(), "NAME".to_string()]);
        assert_eq!(frame.row_count(), 2);
        let first = frame.iter().next().unwrap();
        assert_eq!(first.get("cashtag"), &json!("$AAA"));
        assert_eq!(first.get("NAME"), &Value::Null);
    }

    #[test]
    fn missing_table_is_reported() {
        let dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(dir.path()).unwrap();
        let err = catalog.read_table_sync("db", "nope").unwrap_err();
        assert!(matches!(err, EtlError::TableNotFound { ref table, .. } if table == "nope"));
    }

    #[test]
    fn log_behavior_leaves_catalog_untouched() {
        let dir = tempdir().unwrap();
        let catalog = LocalCatalog::open(dir.path()).unwrap();
        catalog
            .register_table("db", "raw", csv_entry("raw.csv"), UpdateBehavior::Log)
            .unwrap();
        assert!(catalog.load().unwrap().databases.is_empty());
    }

    #[test]
    fn reads_gzip_json_parts_and_skips_bookkeeping_files() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("gold");
        fs::create_dir_all(&table_dir).unwrap();

        let mut enc = flate2::write::GzEncoder::new(
            File::create(table_dir.join("part-00000-a.json.gz")).unwrap(),
            flate2::Compression::default(),
        );
        enc.write_all(b"{\"CASHTAG\":\"AAA\",\"SPREAD\":1.5}\n").unwrap();
        enc.finish().unwrap();
        fs::write(table_dir.join("_manifest.json"), "[]").unwrap();

        let catalog = LocalCatalog::open(dir.path()).unwrap();
        let entry = TableEntry {
            location: PathBuf::from("gold"),
            format: TableFormat::Json,
            compression: None,
            columns: Vec::new(),
            updated_at: None,
        };
        catalog
            .register_table("db", "gold", entry, UpdateBehavior::UpdateInDatabase)
            .unwrap();

        let frame = catalog.read_table_sync("db", "gold").unwrap();
        assert_eq!(frame.row_count(), 1);
        assert_eq!(frame.iter().next().unwrap().get("SPREAD"), &json!(1.5));
    }

    #[test]
    fn header_only_csv_keeps_its_columns() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("raw.csv"), "cashtag,%chg,NAME\n").unwrap();

        let catalog = LocalCatalog::open(dir.path()).unwrap();
        catalog
            .register_table("db", "raw", csv_entry("raw.csv"), UpdateBehavior::UpdateInDatabase)
            .unwrap();

        let frame = catalog.read_table_sync("db", "raw").unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.columns(), &["cashtag".to_string(), "%chg".to_string(), "NAME".to_string()]);
    }

    #[test]
    fn empty_json_table_falls_back_to_registered_columns() {
        let dir = tempdir().unwrap();
        let table_dir = dir.path().join("gold");
        fs::create_dir_all(&table_dir).unwrap();
        fs::write(table_dir.join("part-00000-a.json"), "").unwrap();

        let catalog = LocalCatalog::open(dir.path()).unwrap();
        let entry = TableEntry {
            location: PathBuf::from("gold"),
            format: TableFormat::Json,
            compression: None,
            columns: vec!["CASHTAG".to_string(), "SPREAD".to_string()],
            updated_at: None,
        };
        catalog
            .register_table("db", "gold", entry, UpdateBehavior::UpdateInDatabase)
            .unwrap();

        let frame = catalog.read_table_sync("db", "gold").unwrap();
        assert_eq!(frame.row_count(), 0);
        assert_eq!(frame.columns(), &["CASHTAG".to_string(), "SPREAD".to_string()]);
    }
}
