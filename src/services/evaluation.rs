use thiserror::Error;

use crate::backend::{StoreError, TableStore};
use crate::db::models::{Exam, Profile};
use crate::db::types::{ExamStatus, Grade, SubmissionStatus};
use crate::repositories;
use crate::repositories::results::ResultDraft;
use crate::services::grading;

#[derive(Debug, Error)]
pub(crate) enum EvaluationError {
    #[error("Submission not found")]
    SubmissionNotFound,
    #[error("Exam not found")]
    ExamNotFound,
    #[error("Not authorized to evaluate this submission")]
    NotExamOwner,
    #[error("Marks cannot exceed total marks ({0})")]
    MarksExceedTotal(f64),
    #[error("Marks must be a non-negative number")]
    InvalidMarks,
    #[error("Can only publish draft or scheduled exams")]
    InvalidTransition(ExamStatus),
    #[error("No results to publish for this exam")]
    NothingToPublish,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Evaluation {
    pub(crate) grade: Grade,
    pub(crate) percentage: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct PublishedResults {
    pub(crate) exam: Exam,
    pub(crate) published: u64,
}

/// Grades one submission on behalf of the exam's owner and records the result.
///
/// A previous result for the same submission is overwritten and goes back to
/// unpublished. The result write and the submission status flip are separate
/// store calls; a failure in between leaves the result written.
pub(crate) async fn evaluate(
    store: &dyn TableStore,
    evaluator: &Profile,
    submission_id: &str,
    marks_obtained: f64,
    remarks: Option<String>,
) -> Result<Evaluation, EvaluationError> {
    if !marks_obtained.is_finite() || marks_obtained < 0.0 {
        return Err(EvaluationError::InvalidMarks);
    }

    let submission = repositories::submissions::find_by_id(store, submission_id)
        .await?
        .ok_or(EvaluationError::SubmissionNotFound)?;

    let exam = repositories::exams::find_owned(store, &submission.exam_id, &evaluator.id)
        .await?
        .ok_or(EvaluationError::NotExamOwner)?;

    if marks_obtained > exam.total_marks {
        return Err(EvaluationError::MarksExceedTotal(exam.total_marks));
    }

    let percentage = grading::percentage(marks_obtained, exam.total_marks);
    let grade = grading::grade_for(percentage);

    let draft = ResultDraft {
        exam_id: submission.exam_id.clone(),
        student_id: submission.student_id.clone(),
        submission_id: submission.id.clone(),
        marks_obtained,
        total_marks: exam.total_marks,
        percentage,
        grade,
        remarks,
        evaluated_by: evaluator.id.clone(),
        published: false,
    };

    let regraded = repositories::results::find_by_submission(store, &submission.id).await?.is_some();
    if regraded {
        repositories::results::overwrite(store, &draft).await?;
    } else {
        repositories::results::insert(store, &draft).await?;
    }

    repositories::submissions::set_status(store, &submission.id, SubmissionStatus::Evaluated)
        .await?
        .ok_or(EvaluationError::SubmissionNotFound)?;

    metrics::counter!("submissions_evaluated_total", "grade" => grade.as_str()).increment(1);
    tracing::info!(
        action = "submission.evaluate",
        submission_id = %submission.id,
        exam_id = %exam.id,
        evaluator_id = %evaluator.id,
        grade = grade.as_str(),
        percentage,
        regraded,
        "Submission evaluated"
    );

    Ok(Evaluation { grade, percentage })
}

/// Makes a draft exam visible to students. Re-scheduling is a no-op.
pub(crate) async fn schedule_exam(
    store: &dyn TableStore,
    teacher: &Profile,
    exam_id: &str,
) -> Result<Exam, EvaluationError> {
    let exam = repositories::exams::find_owned(store, exam_id, &teacher.id)
        .await?
        .ok_or(EvaluationError::ExamNotFound)?;

    if !matches!(exam.status, ExamStatus::Draft | ExamStatus::Scheduled) {
        return Err(EvaluationError::InvalidTransition(exam.status));
    }

    let exam = repositories::exams::set_status(store, &exam.id, ExamStatus::Scheduled)
        .await?
        .ok_or(EvaluationError::ExamNotFound)?;

    tracing::info!(action = "exam.schedule", exam_id = %exam.id, teacher_id = %teacher.id, "Exam scheduled");
    Ok(exam)
}

/// Reveals every result of the exam at once, whatever the exam's current status.
pub(crate) async fn publish_results(
    store: &dyn TableStore,
    teacher: &Profile,
    exam_id: &str,
) -> Result<PublishedResults, EvaluationError> {
    let exam = repositories::exams::find_owned(store, exam_id, &teacher.id)
        .await?
        .ok_or(EvaluationError::ExamNotFound)?;

    if repositories::results::count_for_exam(store, &exam.id).await? == 0 {
        return Err(EvaluationError::NothingToPublish);
    }

    let published = repositories::results::publish_for_exam(store, &exam.id).await?;
    let exam = repositories::exams::set_status(store, &exam.id, ExamStatus::ResultsPublished)
        .await?
        .ok_or(EvaluationError::ExamNotFound)?;

    tracing::info!(
        action = "results.publish",
        exam_id = %exam.id,
        teacher_id = %teacher.id,
        published,
        "Exam results published"
    );
    Ok(PublishedResults { exam, published })
}
