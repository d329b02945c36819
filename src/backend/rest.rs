use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use super::error::StoreError;
use super::query::{Query, Row, Table};
use super::store::{rows_from_value, TableStore};

/// PostgREST-style table access (`/rest/v1/<table>`) with the service key.
pub(crate) struct RestStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub(crate) fn new(client: Client, url: &str, service_key: String) -> Self {
        Self { client, base_url: format!("{}/rest/v1", url.trim_end_matches('/')), service_key }
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, table.as_str()))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }
}

fn filter_params(query: &Query) -> Vec<(String, String)> {
    query
        .filters
        .iter()
        .map(|filter| (filter.column.to_string(), format!("eq.{}", filter.value_text())))
        .collect()
}

fn select_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(query));
    if let Some(order) = query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, message) = rejection(response).await;
    Err(StoreError::Rejected { status, message })
}

async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
    let response = ensure_success(response).await?;
    let value: Value = response.json().await?;
    rows_from_value(value)
}

pub(super) async fn rejection(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, extract_message(&body))
}

pub(super) fn extract_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error", "detail"]
                .iter()
                .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next().and_then(|total| total.trim().parse().ok())
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let response =
            self.request(Method::GET, query.table).query(&select_params(query)).send().await?;
        read_rows(response).await
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let body: Vec<Value> = rows.into_iter().map(Value::Object).collect();
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;
        read_rows(response).await
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidQuery("update requires at least one filter".into()));
        }
        let response = self
            .request(Method::PATCH, query.table)
            .query(&filter_params(query))
            .header("Prefer", "return=representation")
            .json(&Value::Object(patch))
            .send()
            .await?;
        read_rows(response).await
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        if query.filters.is_empty() {
            return Err(StoreError::InvalidQuery("delete requires at least one filter".into()));
        }
        let response = self
            .request(Method::DELETE, query.table)
            .query(&filter_params(query))
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(read_rows(response).await?.len() as u64)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(filter_params(query));
        let response = self
            .request(Method::HEAD, query.table)
            .query(&params)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        let response = ensure_success(response).await?;

        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| StoreError::Decode("missing Content-Range count".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Query as QueryParams, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::test_support::spawn_http;

    type Seen = Arc<Mutex<Vec<(HashMap<String, String>, Option<String>)>>>;

    async fn exams(
        State(seen): State<Seen>,
        headers: HeaderMap,
        QueryParams(params): QueryParams<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
        seen.lock().unwrap().push((params, auth));
        (
            [("content-range", "0-1/2")],
            Json(json!([{ "id": "e-1", "title": "Algebra" }, { "id": "e-2", "title": "Optics" }])),
        )
    }

    async fn broken() -> impl IntoResponse {
        (StatusCode::BAD_REQUEST, Json(json!({ "message": "column \"nope\" does not exist" })))
    }

    async fn store() -> (RestStore, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/rest/v1/exams", get(exams))
            .route("/rest/v1/questions", get(broken))
            .with_state(seen.clone());
        let url = spawn_http(app).await;
        (RestStore::new(Client::new(), &url, "service-key".to_string()), seen)
    }

    #[tokio::test]
    async fn select_encodes_filters_order_and_service_key() {
        let (store, seen) = store().await;
        let query = Query::table(Table::Exams).eq("teacher_id", "t-1").order_desc("created_at");

        let rows = store.select(&query).await.expect("rows");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "Algebra");

        let seen = seen.lock().unwrap();
        let (params, auth) = &seen[0];
        assert_eq!(params.get("teacher_id").map(String::as_str), Some("eq.t-1"));
        assert_eq!(params.get("order").map(String::as_str), Some("created_at.desc"));
        assert_eq!(auth.as_deref(), Some("Bearer service-key"));
    }

    #[tokio::test]
    async fn count_reads_total_from_content_range() {
        let (store, _) = store().await;
        let total = store.count(&Query::table(Table::Exams)).await.expect("count");
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn rejection_carries_status_and_message() {
        let (store, _) = store().await;
        let err = store.select(&Query::table(Table::Questions)).await.unwrap_err();
        match err {
            StoreError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unfiltered_update_is_refused() {
        let (store, _) = store().await;
        let err = store.update(&Query::table(Table::Exams), Row::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuery(_)));
    }

    #[test]
    fn content_range_total_is_parsed() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
    }
}
