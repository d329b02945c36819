use serde::Serialize;
use serde_json::Value;

use crate::backend::store::{decode_all, encode};
use crate::backend::{Query, StoreError, Table, TableStore};
use crate::db::models::Question;
use crate::db::types::QuestionType;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewQuestion {
    pub(crate) exam_id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    pub(crate) options: Option<Value>,
    pub(crate) correct_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) order_num: i32,
}

pub(crate) async fn insert_many(
    store: &dyn TableStore,
    questions: &[NewQuestion],
) -> Result<Vec<Question>, StoreError> {
    let rows = questions.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
    decode_all(store.insert(Table::Questions, rows).await?)
}

pub(crate) async fn list_for_exam(
    store: &dyn TableStore,
    exam_id: &str,
) -> Result<Vec<Question>, StoreError> {
    let query = Query::table(Table::Questions).eq("exam_id", exam_id).order_asc("order_num");
    decode_all(store.select(&query).await?)
}
