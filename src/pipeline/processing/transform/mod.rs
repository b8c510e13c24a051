//! Silver and gold shaping of the deduplicated raw frame.

pub mod gold;
pub mod silver;

pub use gold::GoldTransform;
pub use silver::SilverTransform;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::constants::{COL_CASHTAG, COL_CASHTAG_RAW, COL_PCT_CHANGE, COL_PCT_CHG_RAW};
use crate::domain::{Frame, Layer};
use crate::error::Result;
use crate::pipeline::processing::functions::{cast_double, regexp_replace};

pub(crate) static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new("%").expect("static regex"));
pub(crate) static DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$").expect("static regex"));

/// A stateless frame-to-frame transform
pub trait Transform: Send + Sync {
    fn layer(&self) -> Layer;

    fn apply(&self, frame: &Frame) -> Result<Frame>;
}

pub fn for_layer(layer: Layer) -> Box<dyn Transform> {
    match layer {
        Layer::Silver => Box::new(SilverTransform),
        Layer::Gold => Box::new(GoldTransform),
    }
}

/// `PCT_CHANGE` from `%chg` and `CASHTAG` from `cashtag`, shared by both layers
pub(crate) fn normalize_pct_and_cashtag(frame: Frame) -> Frame {
    frame
        .with_column(COL_PCT_CHANGE, |row| pct_change(row.get(COL_PCT_CHG_RAW)))
        .with_column(COL_CASHTAG, |row| strip_cashtag(row.get(COL_CASHTAG_RAW)))
}

pub fn pct_change(raw: &Value) -> Value {
    cast_double(&regexp_replace(raw, &PERCENT, ""))
}

pub fn strip_cashtag(raw: &Value) -> Value {
    regexp_replace(raw, &DOLLAR, "")
}
