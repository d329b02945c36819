use serde::Serialize;
use time::OffsetDateTime;

use crate::backend::store::{decode, decode_all, encode};
use crate::backend::{Query, Row, StoreError, Table, TableStore};
use crate::db::models::Exam;
use crate::db::types::ExamStatus;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewExam {
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    pub(crate) subject: Option<String>,
    pub(crate) description: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub(crate) scheduled_at: Option<OffsetDateTime>,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: f64,
    pub(crate) status: ExamStatus,
}

pub(crate) async fn insert(store: &dyn TableStore, exam: &NewExam) -> Result<Exam, StoreError> {
    decode(store.insert_one(Table::Exams, encode(exam)?).await?)
}

pub(crate) async fn find_by_id(store: &dyn TableStore, id: &str) -> Result<Option<Exam>, StoreError> {
    let row = store.select_optional(&Query::table(Table::Exams).eq("id", id)).await?;
    row.map(decode).transpose()
}

/// Ownership and existence in one lookup: `None` for a missing or foreign exam.
pub(crate) async fn find_owned(
    store: &dyn TableStore,
    id: &str,
    teacher_id: &str,
) -> Result<Option<Exam>, StoreError> {
    let query = Query::table(Table::Exams).eq("id", id).eq("teacher_id", teacher_id);
    store.select_optional(&query).await?.map(decode).transpose()
}

pub(crate) async fn list_by_teacher(
    store: &dyn TableStore,
    teacher_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Exam>, StoreError> {
    let mut query = Query::table(Table::Exams).eq("teacher_id", teacher_id).order_desc("created_at");
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    decode_all(store.select(&query).await?)
}

pub(crate) async fn list_by_status(
    store: &dyn TableStore,
    status: ExamStatus,
) -> Result<Vec<Exam>, StoreError> {
    let query = Query::table(Table::Exams).eq("status", status.as_str()).order_asc("scheduled_at");
    decode_all(store.select(&query).await?)
}

/// Exams students can see: scheduled or active, soonest first.
pub(crate) async fn list_open(store: &dyn TableStore) -> Result<Vec<Exam>, StoreError> {
    let mut exams = list_by_status(store, ExamStatus::Scheduled).await?;
    exams.extend(list_by_status(store, ExamStatus::Active).await?);
    exams.sort_by_key(|exam| exam.scheduled_at);
    Ok(exams)
}

pub(crate) async fn update_owned(
    store: &dyn TableStore,
    id: &str,
    teacher_id: &str,
    patch: Row,
) -> Result<Option<Exam>, StoreError> {
    let query = Query::table(Table::Exams).eq("id", id).eq("teacher_id", teacher_id);
    store.update(&query, patch).await?.into_iter().next().map(decode).transpose()
}

pub(crate) async fn set_status(
    store: &dyn TableStore,
    id: &str,
    status: ExamStatus,
) -> Result<Option<Exam>, StoreError> {
    let mut patch = Row::new();
    patch.insert("status".into(), status.as_str().into());
    let rows = store.update(&Query::table(Table::Exams).eq("id", id), patch).await?;
    rows.into_iter().next().map(decode).transpose()
}

pub(crate) async fn delete_owned(
    store: &dyn TableStore,
    id: &str,
    teacher_id: &str,
) -> Result<u64, StoreError> {
    store.delete(&Query::table(Table::Exams).eq("id", id).eq("teacher_id", teacher_id)).await
}

pub(crate) async fn count(store: &dyn TableStore) -> Result<u64, StoreError> {
    store.count(&Query::table(Table::Exams)).await
}

pub(crate) async fn list_recent(store: &dyn TableStore, limit: u32) -> Result<Vec<Exam>, StoreError> {
    let query = Query::table(Table::Exams).order_desc("created_at").limit(limit);
    decode_all(store.select(&query).await?)
}
