use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::app::ports::{SinkPort, SinkReceipt};
use crate::config::SinkConfig;
use crate::domain::{Compression, Frame, Layer, TableEntry};
use crate::error::Result;
use crate::infra::catalog::LocalCatalog;

const MANIFEST_FILE: &str = "_manifest.json";

/// One part file written by one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartManifest {
    pub file: String,
    pub run_id: String,
    pub rows: usize,
    pub bytes: u64,
    pub sha256: String,
    pub written_at: DateTime<Utc>,
}

/// Writes a frame as JSON lines into the sink directory and optionally
/// registers the result in the catalog.
///
/// Every run appends a new `part-00000-<run_id>.json[.gz]` file; earlier parts
/// stay in place and remain part of the table.
pub struct JsonSink {
    layer: Layer,
    database: String,
    config: SinkConfig,
    catalog: Arc<LocalCatalog>,
}

impl JsonSink {
    pub fn new(layer: Layer, database: &str, config: SinkConfig, catalog: Arc<LocalCatalog>) -> Self {
        Self {
            layer,
            database: database.to_string(),
            config,
            catalog,
        }
    }

    fn part_name(&self, run_id: &str) -> String {
        format!("part-00000-{}.json{}", run_id, self.config.compression.extension())
    }

    fn write_part(&self, frame: &Frame, path: &Path) -> Result<()> {
        let file = BufWriter::new(File::create(path)?);
        match self.config.compression {
            Compression::Gzip => {
                let encoder = write_lines(GzEncoder::new(file, flate2::Compression::default()), frame)?;
                encoder.finish()?.flush()?;
            }
            Compression::None => {
                write_lines(file, frame)?.flush()?;
            }
        }
        Ok(())
    }

    fn append_manifest(&self, dir: &Path, part: PartManifest) -> Result<()> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let mut parts: Vec<PartManifest> = if manifest_path.exists() {
            serde_json::from_str(&fs::read_to_string(&manifest_path)?)?
        } else {
            Vec::new()
        };
        parts.push(part);

        let tmp = dir.join(format!(".{}.tmp", MANIFEST_FILE));
        {
            let mut file = File::create(&tmp)?;
            file.write_all(serde_json::to_string_pretty(&parts)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &manifest_path)?;
        Ok(())
    }
}

fn write_lines<W: Write>(mut writer: W, frame: &Frame) -> Result<W> {
    for row in frame.iter() {
        serde_json::to_writer(&mut writer, &row)?;
        writer.write_all(b"\n")?;
    }
    Ok(writer)
}

#[async_trait]
impl SinkPort for JsonSink {
    async fn write_frame(&self, frame: &Frame, run_id: &str) -> Result<SinkReceipt> {
        fs::create_dir_all(&self.config.path)?;
        let dir = fs::canonicalize(&self.config.path)?;
        let part_name = self.part_name(run_id);
        let part_path = dir.join(&part_name);

        self.write_part(frame, &part_path)?;

        let bytes = fs::read(&part_path)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let size = bytes.len() as u64;

        self.append_manifest(
            &dir,
            PartManifest {
                file: part_name,
                run_id: run_id.to_string(),
                rows: frame.row_count(),
                bytes: size,
                sha256: sha256.clone(),
                written_at: Utc::now(),
            },
        )?;

        info!(
            layer = %self.layer,
            rows = frame.row_count(),
            bytes = size,
            "💾 Wrote {}",
            part_path.display()
        );

        let catalog_table = if self.config.enable_update_catalog {
            let entry = TableEntry {
                location: dir.clone(),
                format: self.config.format(),
                compression: Some(self.config.compression),
                columns: frame.columns().to_vec(),
                updated_at: None,
            };
            self.catalog
                .register_table(&self.database, &self.config.table, entry, self.config.update_behavior)?;
            Some(format!("{}.{}", self.database, self.config.table))
        } else {
            None
        };

        Ok(SinkReceipt {
            layer: self.layer,
            path: part_path,
            rows: frame.row_count(),
            bytes: size,
            sha256,
            catalog_table,
        })
    }
}
