use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants;
use crate::domain::{Compression, Layer, TableFormat, UpdateBehavior};
use crate::error::{EtlError, Result};
use crate::pipeline::processing::quality_gate::PublishingStrategy;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Job configuration. Every section falls back to the stock bursa job, so an
/// absent `config.toml` yields a runnable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub dedup: DedupConfig,
    pub silver: SinkConfig,
    pub gold: SinkConfig,
    pub data_quality: DataQualityConfig,
    pub run_store: RunStoreConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig::default(),
            dedup: DedupConfig::default(),
            silver: SinkConfig::for_layer(Layer::Silver),
            gold: SinkConfig::for_layer(Layer::Gold),
            data_quality: DataQualityConfig::default(),
            run_store: RunStoreConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory holding `catalog.json`
    pub root: PathBuf,
    pub database: String,
    pub source_table: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("catalog"),
            database: constants::DATABASE.to_string(),
            source_table: constants::RAW_TABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub keys: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            keys: vec![constants::COL_CASHTAG_RAW.to_string()],
        }
    }
}

/// One output sink. `path` and `table` are required inside an explicit section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub path: PathBuf,
    pub table: String,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub update_behavior: UpdateBehavior,
    #[serde(default = "default_true")]
    pub enable_update_catalog: bool,
}

fn default_true() -> bool {
    true
}

impl SinkConfig {
    pub fn for_layer(layer: Layer) -> Self {
        let (path, table) = match layer {
            Layer::Silver => (constants::SILVER_PATH, constants::SILVER_TABLE),
            Layer::Gold => (constants::GOLD_PATH, constants::GOLD_TABLE),
        };
        Self {
            path: PathBuf::from(path),
            table: table.to_string(),
            compression: Compression::Gzip,
            update_behavior: UpdateBehavior::UpdateInDatabase,
            enable_update_catalog: true,
        }
    }

    /// Sinks always write JSON lines
    pub fn format(&self) -> TableFormat {
        TableFormat::Json
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQualityConfig {
    pub ruleset: String,
    pub publishing_strategy: PublishingStrategy,
    pub stop_job_on_failure: bool,
    /// Directory receiving one NDJSON results file per evaluation context
    pub results_path: PathBuf,
}

impl Default for DataQualityConfig {
    fn default() -> Self {
        Self {
            ruleset: constants::DEFAULT_DATA_QUALITY_RULESET.to_string(),
            publishing_strategy: PublishingStrategy::BestEffort,
            stop_job_on_failure: false,
            results_path: PathBuf::from("dq-results"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStoreConfig {
    pub path: PathBuf,
}

impl Default for RunStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/job_runs.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub pushgateway_url: Option<String>,
}

impl Config {
    /// Load from `path`, `$BURSA_CONFIG` or `config.toml`, then apply environment overrides.
    ///
    /// An explicitly named file must exist; the implicit default may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("BURSA_CONFIG").ok().map(PathBuf::from));
        let config_path = explicit.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).map_err(|e| {
                EtlError::Config(format!("Failed to read config file '{}': {}", config_path.display(), e))
            })?;
            info!("Loaded configuration from {}", config_path.display());
            Self::from_toml_str(&content)?
        } else if explicit.is_some() {
            return Err(EtlError::Config(format!(
                "Config file '{}' does not exist",
                config_path.display()
            )));
        } else {
            debug!("No {} found, using built-in configuration", DEFAULT_CONFIG_PATH);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("BURSA_CATALOG_ROOT") {
            if !root.trim().is_empty() {
                self.catalog.root = PathBuf::from(root);
            }
        }
        if let Ok(url) = std::env::var("BURSA_PUSHGATEWAY_URL") {
            if !url.trim().is_empty() {
                self.metrics.pushgateway_url = Some(url);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.dedup.keys.is_empty() {
            return Err(EtlError::Config("dedup.keys must name at least one column".to_string()));
        }
        if self.silver.path == self.gold.path {
            return Err(EtlError::Config(format!(
                "silver and gold sinks share the path '{}'",
                self.silver.path.display()
            )));
        }
        Ok(())
    }

    pub fn sink(&self, layer: Layer) -> &SinkConfig {
        match layer {
            Layer::Silver => &self.silver,
            Layer::Gold => &self.gold,
        }
    }
}
