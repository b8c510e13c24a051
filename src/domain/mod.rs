pub mod catalog;
pub mod frame;

pub use catalog::{CatalogDocument, Compression, TableEntry, TableFormat, UpdateBehavior};
pub use frame::{Frame, RowView};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output layer of the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Lightly cleaned, close to raw
    Silver,
    /// Parsed numeric fields, fixed projection
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
