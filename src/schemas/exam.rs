use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::db::models::{Exam, ResultRecord};
use crate::db::types::{ExamStatus, Grade, QuestionType};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ExamCreate {
    #[validate(length(min = 1, max = 300, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default, alias = "scheduledAt", deserialize_with = "deserialize_option_datetime")]
    pub(crate) scheduled_at: Option<OffsetDateTime>,
    #[serde(default = "default_duration", alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be at least 1"))]
    pub(crate) duration_minutes: i32,
    #[serde(default = "default_total_marks", alias = "totalMarks")]
    #[validate(range(exclusive_min = 0.0, message = "total_marks must be positive"))]
    pub(crate) total_marks: f64,
}

/// Partial exam update; serialized straight into the store patch.
#[derive(Debug, Default, Deserialize, Serialize, Validate)]
pub(crate) struct ExamUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 300, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(
        default,
        alias = "scheduledAt",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_option_datetime",
        serialize_with = "time::serde::rfc3339::option::serialize"
    )]
    pub(crate) scheduled_at: Option<OffsetDateTime>,
    #[serde(default, alias = "durationMinutes", skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, message = "duration_minutes must be at least 1"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default, alias = "totalMarks", skip_serializing_if = "Option::is_none")]
    #[validate(range(exclusive_min = 0.0, message = "total_marks must be positive"))]
    pub(crate) total_marks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<ExamStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    #[serde(alias = "questionText")]
    #[validate(length(min = 1, message = "question_text must not be empty"))]
    pub(crate) question_text: String,
    #[serde(default, alias = "questionType")]
    pub(crate) question_type: QuestionType,
    #[serde(default)]
    pub(crate) options: Option<Value>,
    #[serde(default, alias = "correctAnswer")]
    pub(crate) correct_answer: Option<String>,
    #[serde(default = "default_question_marks")]
    #[validate(range(min = 0.0, message = "marks must be non-negative"))]
    pub(crate) marks: f64,
    #[serde(default, alias = "orderNum")]
    pub(crate) order_num: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EvaluateSubmission {
    #[serde(alias = "marksObtained")]
    #[validate(range(min = 0.0, message = "marks_obtained must be non-negative"))]
    pub(crate) marks_obtained: f64,
    #[serde(default)]
    pub(crate) remarks: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationResponse {
    pub(crate) message: String,
    pub(crate) grade: Grade,
    pub(crate) percentage: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamCreated {
    pub(crate) message: String,
    pub(crate) exam: Exam,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionsAdded<T: Serialize> {
    pub(crate) message: String,
    pub(crate) questions: Vec<T>,
}

/// Exam as listed to students, with the owning teacher's name.
#[derive(Debug, Serialize)]
pub(crate) struct OpenExam {
    #[serde(flatten)]
    pub(crate) exam: Exam,
    pub(crate) teacher_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamBrief {
    pub(crate) title: String,
    pub(crate) subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentResult {
    #[serde(flatten)]
    pub(crate) result: ResultRecord,
    pub(crate) exam: Option<ExamBrief>,
}

fn default_duration() -> i32 {
    60
}

fn default_total_marks() -> f64 {
    100.0
}

fn default_question_marks() -> f64 {
    1.0
}

/// RFC 3339, or the `YYYY-MM-DDTHH:MM[:SS]` a `datetime-local` input sends (read as UTC).
pub(crate) fn parse_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }
    None
}

fn deserialize_option_datetime<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datetime_local_input_is_read_as_utc() {
        let parsed = parse_datetime_flexible("2025-03-01T09:30").expect("datetime");
        assert_eq!(parsed.offset(), time::UtcOffset::UTC);
        assert_eq!((parsed.hour(), parsed.minute()), (9, 30));

        assert!(parse_datetime_flexible("2025-03-01T09:30:15").is_some());
        assert!(parse_datetime_flexible("2025-03-01T09:30:00+05:30").is_some());
        assert!(parse_datetime_flexible("tomorrow").is_none());
    }

    #[test]
    fn exam_create_applies_defaults() {
        let exam: ExamCreate = serde_json::from_value(json!({ "title": "Mid-term", "scheduled_at": "" }))
            .expect("exam");
        assert_eq!(exam.duration_minutes, 60);
        assert_eq!(exam.total_marks, 100.0);
        assert!(exam.scheduled_at.is_none());
        assert!(exam.validate().is_ok());
    }

    #[test]
    fn exam_create_rejects_non_positive_total() {
        let exam: ExamCreate =
            serde_json::from_value(json!({ "title": "Quiz", "total_marks": 0 })).expect("exam");
        assert!(exam.validate().is_err());
    }

    #[test]
    fn exam_update_patch_contains_only_sent_fields() {
        let update: ExamUpdate = serde_json::from_value(json!({
            "title": "Final",
            "scheduled_at": "2025-06-01T10:00"
        }))
        .expect("update");
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "title": "Final", "scheduled_at": "2025-06-01T10:00:00Z" })
        );
    }
}
