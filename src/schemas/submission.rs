use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::Submission;
use crate::schemas::user::StudentBrief;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitExam {
    #[serde(default)]
    pub(crate) answers: Value,
}

/// Submission row as shown to the grading teacher.
#[derive(Debug, Serialize)]
pub(crate) struct SubmissionWithStudent {
    #[serde(flatten)]
    pub(crate) submission: Submission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student: Option<StudentBrief>,
}
