use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex as StdMutex, OnceLock};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::backend::local_identity::LocalIdentity;
use crate::backend::query::{value_text, Filter};
use crate::backend::store::decode;
use crate::backend::{
    Backend, BackendConnector, BackendHandle, Query, Row, StoreError, Table, TableStore,
};
use crate::core::config::{SecuritySettings, Settings};
use crate::core::{redis::RedisHandle, state::AppState};
use crate::db::models::{Exam, Profile, Submission};
use crate::db::types::{ExamStatus, Role, SubmissionStatus};
use crate::repositories;
use crate::repositories::exams::NewExam;
use crate::repositories::profiles::NewProfile;
use crate::repositories::submissions::NewSubmission;

const TEST_SECRET_KEY: &str = "test-secret";

#[derive(Debug, Clone, Copy)]
enum Fault {
    Transport,
    ResourceBusy,
}

/// Table store kept in process memory. Mirrors the hosted store closely enough
/// for handler tests: generated ids and timestamps, equality filters, ordering,
/// the one-submission-per-student constraint and injectable faults.
#[derive(Default)]
pub(crate) struct MemoryStore {
    tables: StdMutex<HashMap<Table, Vec<Row>>>,
    faults: StdMutex<Vec<Fault>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_next_with_transport(&self) {
        self.faults.lock().unwrap().push(Fault::Transport);
    }

    pub(crate) fn fail_next_with_busy(&self) {
        self.faults.lock().unwrap().push(Fault::ResourceBusy);
    }

    fn take_fault(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().unwrap();
        if faults.is_empty() {
            return Ok(());
        }
        match faults.remove(0) {
            Fault::Transport => Err(StoreError::Transport("connection reset by peer".into())),
            Fault::ResourceBusy => {
                Err(StoreError::ResourceBusy("[Errno 16] Device or resource busy".into()))
            }
        }
    }

    pub(crate) fn rows(&self, table: Table) -> Vec<Row> {
        self.tables.lock().unwrap().get(&table).cloned().unwrap_or_default()
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let stored = row.get(filter.column).map(value_text).unwrap_or_else(|| "null".into());
        stored == filter.value_text()
    })
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::Null) | None, Some(Value::Null) | None) => Ordering::Equal,
        (Some(Value::Null) | None, _) => Ordering::Greater,
        (_, Some(Value::Null) | None) => Ordering::Less,
        (Some(a), Some(b)) => value_text(a).cmp(&value_text(b)),
    }
}

fn now_text() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap()
}

fn with_defaults(table: Table, mut row: Row) -> Row {
    row.entry("id").or_insert_with(|| Value::from(Uuid::new_v4().to_string()));
    match table {
        Table::Submissions => {
            row.entry("submitted_at").or_insert_with(|| Value::from(now_text()));
        }
        Table::Questions => {}
        _ => {
            row.entry("created_at").or_insert_with(|| Value::from(now_text()));
        }
    }
    if table == Table::Results {
        row.entry("published").or_insert(Value::Bool(false));
    }
    row
}

fn conflicts(table: Table, existing: &[Row], row: &Row) -> bool {
    let same = |left: &Row, column: &str| left.get(column) == row.get(column);
    existing.iter().any(|current| {
        same(current, "id")
            || (table == Table::Submissions
                && same(current, "exam_id")
                && same(current, "student_id"))
            || (matches!(table, Table::AuthIdentities | Table::Profiles)
                && same(current, "email"))
    })
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.take_fault()?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Row> = tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| matches(row, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(order.column), b.get(order.column));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> Result<Vec<Row>, StoreError> {
        self.take_fault()?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table).or_default();

        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let row = with_defaults(table, row);
            if conflicts(table, stored, &row) || conflicts(table, &inserted, &row) {
                return Err(StoreError::Rejected {
                    status: 409,
                    message: format!("duplicate key value violates unique constraint on {}", table.as_str()),
                });
            }
            inserted.push(row);
        }
        stored.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update(&self, query: &Query, patch: Row) -> Result<Vec<Row>, StoreError> {
        self.take_fault()?;
        let mut tables = self.tables.lock().unwrap();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| matches(row, &query.filters)) {
                for (column, value) in &patch {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<u64, StoreError> {
        self.take_fault()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(&query.table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches(row, &query.filters));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.take_fault()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| matches(row, &query.filters)).count())
            .unwrap_or(0) as u64)
    }
}

/// Hands out a fresh `Backend` over the same memory store and counts how often
/// it was asked to.
#[derive(Clone)]
pub(crate) struct CountingConnector {
    store: Arc<MemoryStore>,
    connections: Arc<AtomicUsize>,
}

impl CountingConnector {
    pub(crate) fn new(store: MemoryStore) -> Self {
        Self::shared(Arc::new(store))
    }

    pub(crate) fn shared(store: Arc<MemoryStore>) -> Self {
        Self { store, connections: Arc::new(AtomicUsize::new(0)) }
    }

    pub(crate) fn connections(&self) -> usize {
        self.connections.load(AtomicOrdering::SeqCst)
    }
}

impl BackendConnector for CountingConnector {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn connect(&self) -> Result<Backend, StoreError> {
        self.connections.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(memory_backend(self.store.clone()))
    }
}

fn memory_backend(store: Arc<MemoryStore>) -> Backend {
    let identity = LocalIdentity::new(store.clone(), test_security());
    Backend::new(store, Arc::new(identity))
}

pub(crate) fn test_security() -> SecuritySettings {
    SecuritySettings {
        secret_key: TEST_SECRET_KEY.to_string(),
        access_token_expire_minutes: 60,
        algorithm: "HS256".to_string(),
    }
}

/// A connected backend over a memory store, for service-level tests.
pub(crate) struct MemoryBackend {
    pub(crate) backend: Backend,
    pub(crate) store: Arc<MemoryStore>,
}

impl MemoryBackend {
    pub(crate) fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self { backend: memory_backend(store.clone()), store }
    }

    /// An identity that can log in but has no profile row.
    pub(crate) async fn identity_without_profile(&self, email: &str) -> String {
        let identity = self.backend.identity();
        identity.create_identity(email, "pw123456").await.expect("identity");
        identity.verify_password(email, "pw123456").await.expect("session").access_token
    }
}

/// Creates identity and profile; returns the profile with a fresh bearer token.
pub(crate) async fn seed_profile(backend: &Backend, email: &str, role: Role) -> (Profile, String) {
    let identity = backend.identity();
    let user_id = identity.create_identity(email, "pw123456").await.expect("identity");
    let profile = repositories::profiles::insert(
        backend.store(),
        &NewProfile {
            id: user_id,
            email: email.to_string(),
            full_name: format!("{} user", role.as_str()),
            role,
            department: None,
            reg_number: None,
            gender: None,
        },
    )
    .await
    .expect("profile");
    let session = identity.verify_password(email, "pw123456").await.expect("session");
    (profile, session.access_token)
}

pub(crate) async fn seed_exam(
    store: &dyn TableStore,
    teacher_id: &str,
    total_marks: f64,
    status: ExamStatus,
) -> Exam {
    repositories::exams::insert(
        store,
        &NewExam {
            teacher_id: teacher_id.to_string(),
            title: "Thermodynamics".to_string(),
            subject: Some("Physics".to_string()),
            description: None,
            scheduled_at: None,
            duration_minutes: 60,
            total_marks,
            status,
        },
    )
    .await
    .expect("exam")
}

pub(crate) async fn seed_submission(
    store: &dyn TableStore,
    exam_id: &str,
    student_id: &str,
) -> Submission {
    repositories::submissions::insert(
        store,
        &NewSubmission {
            exam_id: exam_id.to_string(),
            student_id: student_id.to_string(),
            answers: json!({ "1": "entropy never decreases" }),
            status: SubmissionStatus::Submitted,
        },
    )
    .await
    .expect("submission")
}

pub(crate) async fn spawn_http(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) connector: CountingConnector,
    _guard: OwnedMutexGuard<()>,
}

impl TestContext {
    pub(crate) async fn backend(&self) -> Backend {
        self.state.backend().get().await.expect("backend")
    }

    pub(crate) async fn profile(&self, id: &str) -> Option<Profile> {
        self.store
            .rows(Table::Profiles)
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
            .map(|row| decode(row).expect("profile row"))
    }
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAM_CONNECT_ENV", "test");
    std::env::set_var("EXAM_CONNECT_STRICT_CONFIG", "0");
    std::env::set_var("BACKEND_MODE", "supabase");
    std::env::set_var("SUPABASE_URL", "http://127.0.0.1:9");
    std::env::set_var("SUPABASE_KEY", "test-anon-key");
    std::env::remove_var("SUPABASE_SERVICE_KEY");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("FIRST_ADMIN_EMAIL");
    std::env::remove_var("FIRST_ADMIN_PASSWORD");
    std::env::remove_var("CORS_ORIGINS");
}

pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::new());
    let connector = CountingConnector::shared(store.clone());
    let backend = BackendHandle::new(Arc::new(connector.clone()));
    // Never connected, so rate limiting stays open.
    let redis = RedisHandle::new(settings.redis().redis_url());

    let state = AppState::new(settings, backend, redis);
    let app = api::router::router(state.clone());

    TestContext { state, app, store, connector, _guard: guard }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
