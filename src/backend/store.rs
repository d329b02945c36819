use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::error::StoreError;
use super::query::{Query, Row, Table};

/// Table-shaped persistence. Both the hosted REST backend and the direct
/// Postgres pool speak this; handlers only ever see rows.
#[async_trait]
pub(crate) trait TableStore: Send + Sync {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Inserts every row and returns them as stored, defaults filled in.
    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError>;

    async fn delete(&self, query: &Query) -> Result<u64, StoreError>;

    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// Exactly one match, otherwise `NoRows`/`MultipleRows`.
    async fn select_single(&self, query: &Query) -> Result<Row, StoreError> {
        let mut rows = self.select(query).await?;
        match rows.len() {
            0 => Err(StoreError::NoRows),
            1 => Ok(rows.remove(0)),
            found => Err(StoreError::MultipleRows(found)),
        }
    }

    async fn select_optional(&self, query: &Query) -> Result<Option<Row>, StoreError> {
        match self.select_single(query).await {
            Ok(row) => Ok(Some(row)),
            Err(StoreError::NoRows) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn insert_one(&self, table: Table, row: Row) -> Result<Row, StoreError> {
        let mut rows = self.insert(table, vec![row]).await?;
        if rows.is_empty() {
            return Err(StoreError::NoRows);
        }
        Ok(rows.remove(0))
    }
}

pub(crate) fn decode<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|err| StoreError::Decode(err.to_string()))
}

pub(crate) fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode).collect()
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Row, StoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Decode(format!("expected an object, got {other}"))),
        Err(err) => Err(StoreError::Decode(err.to_string())),
    }
}

/// Turns a `serde_json::Value` list returned by a backend into rows.
pub(crate) fn rows_from_value(value: Value) -> Result<Vec<Row>, StoreError> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(StoreError::Decode(format!("expected an object, got {other}"))),
            })
            .collect(),
        Value::Object(map) => Ok(vec![map]),
        other => Err(StoreError::Decode(format!("expected rows, got {other}"))),
    }
}
