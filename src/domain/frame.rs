use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{EtlError, Result};

static NULL: Value = Value::Null;

/// An in-memory table: named columns over rows of JSON scalars.
///
/// Column lookups are case-insensitive, so `cashtag` and `CASHTAG` name the
/// same column. Every row always holds exactly one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// Borrowed view of a single row, readable by column name.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    /// Value of `name`, or `Null` when the frame has no such column
    pub fn get(&self, name: &str) -> &'a Value {
        match position_of(self.columns, name) {
            Some(idx) => &self.values[idx],
            None => &NULL,
        }
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn position_of(columns: &[String], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.eq_ignore_ascii_case(name))
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    /// Builds a frame from JSON objects. Columns start with `schema` and
    /// continue with the remaining keys in first-seen order; keys missing from
    /// an object become `Null`. With no objects the frame keeps `schema`.
    pub fn from_objects(schema: Vec<String>, objects: Vec<Map<String, Value>>) -> Self {
        let mut columns: Vec<String> = Vec::with_capacity(schema.len());
        for name in schema {
            if position_of(&columns, &name).is_none() {
                columns.push(name);
            }
        }
        for obj in &objects {
            for key in obj.keys() {
                if position_of(&columns, key).is_none() {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .into_iter()
            .map(|obj| {
                columns
                    .iter()
                    .map(|c| {
                        obj.iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(c))
                            .map(|(_, v)| v.clone())
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::SchemaMismatch {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        position_of(&self.columns, name).is_some()
    }

    /// Fails with `ColumnNotFound` for the first name the frame lacks
    pub fn require(&self, names: &[&str]) -> Result<()> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(EtlError::ColumnNotFound((*missing).to_string())),
            None => Ok(()),
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = position_of(&self.columns, name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |r| RowView {
            columns: &self.columns,
            values: r,
        })
    }

    /// Computes a column per row. An existing column with the same name is
    /// replaced in place and renamed to `name`; otherwise it is appended.
    pub fn with_column<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&RowView<'_>) -> Value,
    {
        let computed: Vec<Value> = self.iter().map(|row| f(&row)).collect();

        match position_of(&self.columns, name) {
            Some(idx) => {
                self.columns[idx] = name.to_string();
                for (row, value) in self.rows.iter_mut().zip(computed) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(computed) {
                    row.push(value);
                }
            }
        }
        self
    }

    /// Removes `name` if present
    pub fn drop(mut self, name: &str) -> Self {
        if let Some(idx) = position_of(&self.columns, name) {
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        self
    }

    /// Projects onto exactly `names`, in that order, under those names
    pub fn select(self, names: &[&str]) -> Result<Self> {
        let indices = names
            .iter()
            .map(|n| position_of(&self.columns, n).ok_or_else(|| EtlError::ColumnNotFound((*n).to_string())))
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Self {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        })
    }

    /// Keeps the first row for every distinct combination of `keys`.
    /// `Null` keys compare equal to each other.
    pub fn drop_duplicates(self, keys: &[&str]) -> Result<Self> {
        let indices = keys
            .iter()
            .map(|k| position_of(&self.columns, k).ok_or_else(|| EtlError::ColumnNotFound((*k).to_string())))
            .collect::<Result<Vec<_>>>()?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut rows = Vec::with_capacity(self.rows.len());
        for row in self.rows {
            let key: Vec<&Value> = indices.iter().map(|&i| &row[i]).collect();
            if seen.insert(serde_json::to_string(&key)?) {
                rows.push(row);
            }
        }

        Ok(Self {
            columns: self.columns,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Frame {
        Frame::from_rows(
            vec!["cashtag".into(), "PRICE".into()],
            vec![
                vec![json!("$AAA"), json!("1.00")],
                vec![json!("$BBB"), json!("2.00")],
                vec![json!("$AAA"), json!("3.00")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn with_column_replaces_case_insensitive_match_in_place() {
        let frame = sample().with_column("CASHTAG", |r| json!(r.get("cashtag").as_str().unwrap().trim_start_matches('$')));
        assert_eq!(frame.columns(), &["CASHTAG".to_string(), "PRICE".to_string()]);
        assert_eq!(frame.column("CASHTAG").unwrap()[0], &json!("AAA"));
    }

    #[test]
    fn with_column_appends_new_column() {
        let frame = sample().with_column("ONE", |_| json!(1));
        assert_eq!(frame.column_count(), 3);
        assert_eq!(frame.columns()[2], "ONE");
    }

    #[test]
    fn drop_duplicates_keeps_first_occurrence() {
        let frame = sample().drop_duplicates(&["cashtag"]).unwrap();
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.column("price").unwrap(), vec![&json!("1.00"), &json!("2.00")]);
    }

    #[test]
    fn drop_duplicates_treats_nulls_as_equal() {
        let frame = Frame::from_rows(
            vec!["cashtag".into()],
            vec![vec![Value::Null], vec![Value::Null], vec![json!("$X")]],
        )
        .unwrap()
        .drop_duplicates(&["cashtag"])
        .unwrap();
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn select_missing_column_is_an_error() {
        let err = sample().select(&["cashtag", "VOLUME"]).unwrap_err();
        assert!(matches!(err, EtlError::ColumnNotFound(c) if c == "VOLUME"));
    }

    #[test]
    fn select_uses_requested_names_and_order() {
        let frame = sample().select(&["price", "CASHTAG"]).unwrap();
        assert_eq!(frame.columns(), &["price".to_string(), "CASHTAG".to_string()]);
        assert_eq!(frame.iter().next().unwrap().values(), &[json!("1.00"), json!("$AAA")]);
    }

    #[test]
    fn push_row_rejects_wrong_width() {
        let mut frame = Frame::new(vec!["a".into(), "b".into()]);
        assert!(matches!(
            frame.push_row(vec![json!(1)]),
            Err(EtlError::SchemaMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn from_objects_unions_keys_in_first_seen_order() {
        let a = json!({"x": 1, "y": 2}).as_object().unwrap().clone();
        let b = json!({"z": 3, "x": 4}).as_object().unwrap().clone();
        let frame = Frame::from_objects(Vec::new(), vec![a, b]);
        assert_eq!(frame.columns(), &["x".to_string(), "y".to_string(), "z".to_string()]);
        assert_eq!(frame.iter().nth(1).unwrap().values(), &[json!(4), Value::Null, json!(3)]);
    }

    #[test]
    fn from_objects_keeps_schema_without_rows() {
        let frame = Frame::from_objects(vec!["cashtag".into(), "PRICE".into()], Vec::new());
        assert!(frame.is_empty());
        assert_eq!(frame.column_count(), 2);

        let deduped = frame.drop_duplicates(&["cashtag"]).unwrap();
        assert_eq!(deduped.columns(), &["cashtag".to_string(), "PRICE".to_string()]);
    }

    #[test]
    fn rows_serialize_in_column_order() {
        let frame = sample();
        let line = serde_json::to_string(&frame.iter().next().unwrap()).unwrap();
        assert_eq!(line, r#"{"cashtag":"$AAA","PRICE":"1.00"}"#);
    }
}
