use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::db::types::{ExamStatus, Gender, Grade, QuestionType, Role, SubmissionStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Profile {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) full_name: String,
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) department: Option<String>,
    #[serde(default)]
    pub(crate) reg_number: Option<String>,
    #[serde(default)]
    pub(crate) gender: Option<Gender>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) teacher_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) scheduled_at: Option<OffsetDateTime>,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: f64,
    pub(crate) status: ExamStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) question_text: String,
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) options: Option<Value>,
    #[serde(default)]
    pub(crate) correct_answer: Option<String>,
    pub(crate) marks: f64,
    pub(crate) order_num: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    #[serde(default)]
    pub(crate) answers: Value,
    pub(crate) status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) submitted_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ResultRecord {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) student_id: String,
    pub(crate) submission_id: String,
    pub(crate) marks_obtained: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: f64,
    pub(crate) grade: Grade,
    #[serde(default)]
    pub(crate) remarks: Option<String>,
    pub(crate) evaluated_by: String,
    pub(crate) published: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn exam_row_decodes_store_timestamps() {
        let exam: Exam = serde_json::from_value(json!({
            "id": "e-1",
            "teacher_id": "t-1",
            "title": "Mid-term",
            "subject": null,
            "scheduled_at": "2025-03-01T09:30:00+00:00",
            "duration_minutes": 60,
            "total_marks": 100,
            "status": "scheduled",
            "created_at": "2025-02-01T08:00:00.123456+00:00"
        }))
        .expect("exam");

        assert_eq!(exam.total_marks, 100.0);
        assert_eq!(exam.status, ExamStatus::Scheduled);
        assert_eq!(exam.scheduled_at.map(|at| at.hour()), Some(9));
        assert!(exam.description.is_none());
    }
}
