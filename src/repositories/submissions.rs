use serde::Serialize;
use serde_json::Value;

use crate::backend::store::{decode, decode_all, encode};
use crate::backend::{Query, Row, StoreError, Table, TableStore};
use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewSubmission {
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) answers: Value,
    pub(crate) status: SubmissionStatus,
}

pub(crate) async fn insert(
    store: &dyn TableStore,
    submission: &NewSubmission,
) -> Result<Submission, StoreError> {
    decode(store.insert_one(Table::Submissions, encode(submission)?).await?)
}

pub(crate) async fn find_by_id(
    store: &dyn TableStore,
    id: &str,
) -> Result<Option<Submission>, StoreError> {
    let row = store.select_optional(&Query::table(Table::Submissions).eq("id", id)).await?;
    row.map(decode).transpose()
}

pub(crate) async fn find_for_student(
    store: &dyn TableStore,
    exam_id: &str,
    student_id: &str,
) -> Result<Option<Submission>, StoreError> {
    let query =
        Query::table(Table::Submissions).eq("exam_id", exam_id).eq("student_id", student_id);
    store.select_optional(&query).await?.map(decode).transpose()
}

pub(crate) async fn list_for_exam(
    store: &dyn TableStore,
    exam_id: &str,
) -> Result<Vec<Submission>, StoreError> {
    let query = Query::table(Table::Submissions).eq("exam_id", exam_id).order_desc("submitted_at");
    decode_all(store.select(&query).await?)
}

pub(crate) async fn set_status(
    store: &dyn TableStore,
    id: &str,
    status: SubmissionStatus,
) -> Result<Option<Submission>, StoreError> {
    let mut patch = Row::new();
    patch.insert("status".into(), status.as_str().into());
    let rows = store.update(&Query::table(Table::Submissions).eq("id", id), patch).await?;
    rows.into_iter().next().map(decode).transpose()
}

pub(crate) async fn count(store: &dyn TableStore) -> Result<u64, StoreError> {
    store.count(&Query::table(Table::Submissions)).await
}

pub(crate) async fn count_for_exam(
    store: &dyn TableStore,
    exam_id: &str,
    status: Option<SubmissionStatus>,
) -> Result<u64, StoreError> {
    let mut query = Query::table(Table::Submissions).eq("exam_id", exam_id);
    if let Some(status) = status {
        query = query.eq("status", status.as_str());
    }
    store.count(&query).await
}

pub(crate) async fn count_for_student(
    store: &dyn TableStore,
    student_id: &str,
    status: Option<SubmissionStatus>,
) -> Result<u64, StoreError> {
    let mut query = Query::table(Table::Submissions).eq("student_id", student_id);
    if let Some(status) = status {
        query = query.eq("status", status.as_str());
    }
    store.count(&query).await
}
