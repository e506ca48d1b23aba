//! Row and streaming types for query results.

use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::AppError;

/// Parameters for Cypher queries, keyed by name (without the `$`).
pub type Params = HashMap<String, JsonValue>;

/// A stream of rows from a query result.
pub type RowStream<'a> = Pin<Box<dyn Stream<Item = Result<Row, AppError>> + Send + 'a>>;

/// A single row from a query result.
///
/// Column values are held as JSON, with typed extraction via [`Row::get`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    data: HashMap<String, JsonValue>,
}

impl Row {
    /// Creates a new row from a map of column names to values.
    pub fn new(data: HashMap<String, JsonValue>) -> Self {
        Self { data }
    }

    /// Builds a single-column row.
    pub fn single(column: &str, value: JsonValue) -> Self {
        Self::new(HashMap::from([(column.to_string(), value)]))
    }

    /// Gets a value by column name, deserializing to the requested type.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or deserialization fails.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| AppError::Internal(format!("column not found: {}", key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e)))
    }

    /// Gets a value, returning `None` if the column is missing or null.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.data.get(key) {
            Some(v) if v.is_null() => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| AppError::Internal(format!("failed to deserialize '{}': {}", key, e))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_get_number() {
        let row = Row::single("count", json!(42));
        let count: i64 = row.get("count").unwrap();
        assert_eq!(count, 42);
    }

    #[test]
    fn test_row_get_missing_key() {
        let row = Row::default();
        let result: Result<String, _> = row.get("missing");
        assert!(result.is_err());
    }

    #[test]
    fn test_row_get_wrong_type() {
        let row = Row::single("count", json!("many"));
        let result: Result<i64, _> = row.get("count");
        assert!(result.is_err());
    }

    #[test]
    fn test_row_get_opt_null() {
        let row = Row::single("doc", JsonValue::Null);
        let doc: Option<String> = row.get_opt("doc").unwrap();
        assert_eq!(doc, None);
    }
}
