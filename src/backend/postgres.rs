use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::error::StoreError;
use super::query::{is_identifier, Query, Row, Table};
use super::store::{rows_from_value, TableStore};

/// Same table contract as the hosted backend, served from our own database.
/// Rows travel as `jsonb` so column sets stay dynamic.
#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn column(name: &str) -> Result<String, StoreError> {
    if is_identifier(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(StoreError::InvalidQuery(format!("invalid column name: {name}")))
    }
}

fn push_where(builder: &mut QueryBuilder<'_, Postgres>, query: &Query) -> Result<(), StoreError> {
    for (index, filter) in query.filters.iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        builder.push(format!("t.{}::text = ", column(filter.column)?));
        builder.push_bind(filter.value_text());
    }
    Ok(())
}

fn patch_columns<'a>(rows: impl Iterator<Item = &'a Row>) -> Result<Vec<String>, StoreError> {
    let names: BTreeSet<&String> = rows.flat_map(|row| row.keys()).collect();
    names.into_iter().map(|name| column(name)).collect()
}

fn into_rows(values: Vec<Value>) -> Result<Vec<Row>, StoreError> {
    rows_from_value(Value::Array(values))
}

#[async_trait]
impl TableStore for PgStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT row_to_json(t)::jsonb FROM {} AS t",
            query.table.as_str()
        ));
        push_where(&mut builder, query)?;
        if let Some(order) = query.order {
            builder.push(format!(
                " ORDER BY t.{} {}",
                column(order.column)?,
                if order.descending { "DESC" } else { "ASC" }
            ));
        }
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        let values: Vec<Value> = builder.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        into_rows(values)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let columns = patch_columns(rows.iter())?.join(", ");
        let table = table.as_str();

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {table} AS t ({columns}) SELECT {columns} \
             FROM jsonb_populate_recordset(NULL::{table}, "
        ));
        builder.push_bind(Value::Array(rows.into_iter().map(Value::Object).collect()));
        builder.push(") RETURNING row_to_json(t)::jsonb");

        let values: Vec<Value> = builder.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        into_rows(values)
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidQuery("update requires at least one filter".into()));
        }
        if patch.is_empty() {
            return self.select(query).await;
        }
        let table = query.table.as_str();
        let assignments = patch_columns(std::iter::once(&patch))?
            .into_iter()
            .map(|name| format!("{name} = p.{name}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, "
        ));
        builder.push_bind(Value::Object(patch));
        builder.push(") AS p");
        push_where(&mut builder, query)?;
        builder.push(" RETURNING row_to_json(t)::jsonb");

        let values: Vec<Value> = builder.build_query_scalar::<Value>().fetch_all(&self.pool).await?;
        into_rows(values)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidQuery("delete requires at least one filter".into()));
        }
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("DELETE FROM {} AS t", query.table.as_str()));
        push_where(&mut builder, query)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM {} AS t",
            query.table.as_str()
        ));
        push_where(&mut builder, query)?;

        let total: i64 = builder.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }
}
