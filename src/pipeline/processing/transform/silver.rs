use crate::constants::{COL_CASHTAG_RAW, COL_PCT_CHG_RAW};
use crate::domain::{Frame, Layer};
use crate::error::Result;

use super::{normalize_pct_and_cashtag, Transform};

/// Parses `%chg` into `PCT_CHANGE`, strips `$` from the cashtag and drops `%chg`.
/// Every other raw column passes through untouched.
pub struct SilverTransform;

impl Transform for SilverTransform {
    fn layer(&self) -> Layer {
        Layer::Silver
    }

    fn apply(&self, frame: &Frame) -> Result<Frame> {
        frame.require(&[COL_PCT_CHG_RAW, COL_CASHTAG_RAW])?;
        Ok(normalize_pct_and_cashtag(frame.clone()).drop(COL_PCT_CHG_RAW))
    }
}
