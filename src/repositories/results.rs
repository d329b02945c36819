use serde::Serialize;

use crate::backend::store::{decode, decode_all, encode};
use crate::backend::{Query, Row, StoreError, Table, TableStore};
use crate::db::models::ResultRecord;
use crate::db::types::Grade;

/// Every evaluator-controlled column of a result. Written whole on each evaluation.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResultDraft {
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) submission_id: String,
    pub(crate) marks_obtained: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: Grade,
    pub(crate) remarks: Option<String>,
    pub(crate) evaluated_by: String,
    pub(crate) published: bool,
}

pub(crate) async fn find_by_submission(
    store: &dyn TableStore,
    submission_id: &str,
) -> Result<Option<ResultRecord>, StoreError> {
    let query = Query::table(Table::Results).eq("submission_id", submission_id).limit(1);
    store.select(&query).await?.into_iter().next().map(decode).transpose()
}

pub(crate) async fn insert(
    store: &dyn TableStore,
    draft: &ResultDraft,
) -> Result<ResultRecord, StoreError> {
    decode(store.insert_one(Table::Results, encode(draft)?).await?)
}

/// Rewrites every result row recorded for the draft's submission.
pub(crate) async fn overwrite(
    store: &dyn TableStore,
    draft: &ResultDraft,
) -> Result<Vec<ResultRecord>, StoreError> {
    let query = Query::table(Table::Results).eq("submission_id", draft.submission_id.as_str());
    decode_all(store.update(&query, encode(draft)?).await?)
}

pub(crate) async fn list_for_exam(
    store: &dyn TableStore,
    exam_id: &str,
) -> Result<Vec<ResultRecord>, StoreError> {
    decode_all(store.select(&Query::table(Table::Results).eq("exam_id", exam_id)).await?)
}

pub(crate) async fn count_for_exam(store: &dyn TableStore, exam_id: &str) -> Result<u64, StoreError> {
    store.count(&Query::table(Table::Results).eq("exam_id", exam_id)).await
}

pub(crate) async fn publish_for_exam(store: &dyn TableStore, exam_id: &str) -> Result<u64, StoreError> {
    let mut patch = Row::new();
    patch.insert("published".into(), true.into());
    let rows = store.update(&Query::table(Table::Results).eq("exam_id", exam_id), patch).await?;
    Ok(rows.len() as u64)
}

pub(crate) async fn list_published_for_student(
    store: &dyn TableStore,
    student_id: &str,
) -> Result<Vec<ResultRecord>, StoreError> {
    let query = Query::table(Table::Results)
        .eq("student_id", student_id)
        .eq("published", true)
        .order_desc("created_at");
    decode_all(store.select(&query).await?)
}
