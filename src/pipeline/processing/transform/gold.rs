use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::constants::*;
use crate::domain::{Frame, Layer};
use crate::error::Result;
use crate::pipeline::processing::functions::{cast_double, cast_int, regexp_extract, subtract};

use super::{normalize_pct_and_cashtag, Transform};

static PRICE_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"([\d.]+)").expect("static regex"));
static QTY_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)\)").expect("static regex"));

/// Splits the `PRICE(QTY)` order-book fields, derives spread and delta, and
/// narrows the row to [`GOLD_COLUMNS`].
///
/// `HIGH`, `LOW` and `CLOSE` feed `SPREAD` and `DELTA` but are not projected.
pub struct GoldTransform;

impl Transform for GoldTransform {
    fn layer(&self) -> Layer {
        Layer::Gold
    }

    fn apply(&self, frame: &Frame) -> Result<Frame> {
        frame.require(&[
            COL_BUY_QTY_RAW,
            COL_SELL_QTY_RAW,
            COL_HIGH,
            COL_LOW,
            COL_PRICE,
            COL_CLOSE,
            COL_PCT_CHG_RAW,
            COL_CASHTAG_RAW,
        ])?;

        let shaped = frame
            .clone()
            .with_column(COL_BUY_PRICE, |row| order_price(row.get(COL_BUY_QTY_RAW)))
            .with_column(COL_BUY_QTY, |row| order_qty(row.get(COL_BUY_QTY_RAW)))
            .with_column(COL_SELL_PRICE, |row| order_price(row.get(COL_SELL_QTY_RAW)))
            .with_column(COL_SELL_QTY, |row| order_qty(row.get(COL_SELL_QTY_RAW)))
            .with_column(COL_SPREAD, |row| cast_double(&subtract(row.get(COL_HIGH), row.get(COL_LOW))))
            .with_column(COL_DELTA, |row| cast_double(&subtract(row.get(COL_PRICE), row.get(COL_CLOSE))));

        normalize_pct_and_cashtag(shaped).select(&GOLD_COLUMNS)
    }
}

/// Leading price of a `12.34(500)` field
pub fn order_price(raw: &Value) -> Value {
    cast_double(&regexp_extract(raw, &PRICE_PART, 1))
}

/// Parenthesized quantity of a `12.34(500)` field
pub fn order_qty(raw: &Value) -> Value {
    cast_int(&regexp_extract(raw, &QTY_PART, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use serde_json::json;

    fn raw_columns() -> Vec<String> {
        [
            "cashtag", "NAME", "PRICE", "CHG", "%chg", "VOLUME", "BUY (QTY)", "SELL (QTY)", "HIGH", "LOW",
            "CLOSE",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect()
    }

    fn raw_row(cashtag: &str, buy: &str, sell: &str, high: f64, low: f64, price: f64, close: f64) -> Vec<Value> {
        vec![
            json!(cashtag),
            json!("Some Bhd"),
            json!(price),
            json!("+0.02"),
            json!("-1.25%"),
            json!("1,200"),
            json!(buy),
            json!(sell),
            json!(high),
            json!(low),
            json!(close),
        ]
    }

    #[test]
    fn splits_buy_and_sell_fields() {
        let frame = Frame::from_rows(
            raw_columns(),
            vec![raw_row("$AAPL", "12.34(500)", "12.40(1200)", 13.0, 12.0, 12.5, 12.0)],
        )
        .unwrap();
        let out = GoldTransform.apply(&frame).unwrap();
        let row = out.iter().next().unwrap();
        assert_eq!(row.get("BUY_PRICE"), &json!(12.34));
        assert_eq!(row.get("BUY_QTY"), &json!(500));
        assert_eq!(row.get("SELL_PRICE"), &json!(12.4));
        assert_eq!(row.get("SELL_QTY"), &json!(1200));
        assert_eq!(row.get("PCT_CHANGE"), &json!(-1.25));
        assert_eq!(row.get("CASHTAG"), &json!("AAPL"));
    }

    #[test]
    fn derives_spread_and_delta() {
        let frame = Frame::from_rows(
            raw_columns(),
            vec![raw_row("$X", "1.00(1)", "1.10(1)", 5.5, 2.25, 4.0, 3.5)],
        )
        .unwrap();
        let out = GoldTransform.apply(&frame).unwrap();
        let row = out.iter().next().unwrap();
        assert_eq!(row.get("SPREAD"), &json!(3.25));
        assert_eq!(row.get("DELTA"), &json!(0.5));
    }

    #[test]
    fn projects_exactly_the_gold_columns() {
        let frame = Frame::from_rows(raw_columns(), vec![raw_row("$X", "-", "-", 1.0, 1.0, 1.0, 1.0)]).unwrap();
        let out = GoldTransform.apply(&frame).unwrap();
        let expected: Vec<String> = GOLD_COLUMNS.iter().map(|c| c.to_string()).collect();
        assert_eq!(out.columns(), expected.as_slice());
        assert!(!out.has_column("HIGH"));
    }

    #[test]
    fn placeholder_order_fields_become_null() {
        let frame = Frame::from_rows(raw_columns(), vec![raw_row("$X", "-", "", 1.0, 1.0, 1.0, 1.0)]).unwrap();
        let out = GoldTransform.apply(&frame).unwrap();
        let row = out.iter().next().unwrap();
        assert_eq!(row.get("BUY_PRICE"), &Value::Null);
        assert_eq!(row.get("BUY_QTY"), &Value::Null);
        assert_eq!(row.get("SELL_PRICE"), &Value::Null);
    }

    #[test]
    fn missing_source_column_is_rejected() {
        let frame = Frame::from_rows(vec!["cashtag".into()], vec![vec![json!("$X")]]).unwrap();
        assert!(matches!(GoldTransform.apply(&frame), Err(EtlError::ColumnNotFound(_))));
    }
}
