//! Driver-neutral statement parameters and result rows.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, StoreError};

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Int(i64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

/// One result row: column names mapped to values, in select order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push((name.into(), value));
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            Value::Int(v) => Ok(*v),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            Value::Text(v) => Ok(v),
            other => Err(mismatch(name, "text", other)),
        }
    }

    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        match self.require(name)? {
            Value::Date(v) => Ok(*v),
            Value::Timestamp(v) => Ok(v.date()),
            other => Err(mismatch(name, "date", other)),
        }
    }

    pub fn timestamp(&self, name: &str) -> Result<NaiveDateTime> {
        match self.require(name)? {
            Value::Timestamp(v) => Ok(*v),
            other => Err(mismatch(name, "timestamp", other)),
        }
    }

    fn require(&self, name: &str) -> Result<&Value> {
        self.get(name)
            .ok_or_else(|| StoreError::Decode(format!("missing column `{name}`")))
    }
}

fn mismatch(name: &str, expected: &str, got: &Value) -> StoreError {
    StoreError::Decode(format!("column `{name}`: expected {expected}, got {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters() {
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let row = Row::new()
            .with("id", 7)
            .with("name", "Alice")
            .with("expiry_date", date);
        assert_eq!(row.int("id").unwrap(), 7);
        assert_eq!(row.text("name").unwrap(), "Alice");
        assert_eq!(row.date("expiry_date").unwrap(), date);
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn missing_and_mistyped_columns_are_decode_errors() {
        let row = Row::new().with("id", "seven");
        assert!(matches!(row.int("id"), Err(StoreError::Decode(_))));
        assert!(matches!(row.text("name"), Err(StoreError::Decode(_))));
    }

    #[test]
    fn columns_keep_select_order() {
        let row = Row::new().with("b", 1).with("a", 2);
        let names: Vec<&str> = row.columns().map(|(n, _)| n).collect();
        assert_eq!(names, ["b", "a"]);
    }
}
