use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{connected_backend, CurrentStudent};
use crate::backend::StoreError;
use crate::core::state::AppState;
use crate::db::models::Submission;
use crate::db::types::SubmissionStatus;
use crate::repositories;
use crate::repositories::submissions::NewSubmission;
use crate::schemas::dashboard::StudentDashboard;
use crate::schemas::exam::{ExamBrief, OpenExam, StudentResult};
use crate::schemas::submission::SubmitExam;
use crate::services::dashboards;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/exams", get(list_exams))
        .route("/exams/:exam_id/submit", post(submit_exam))
        .route("/results", get(list_results))
}

async fn dashboard(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<StudentDashboard>, ApiError> {
    let backend = connected_backend(&state).await?;
    let overview = dashboards::student(backend.store(), &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Dashboard error"))?;
    Ok(Json(overview))
}

async fn list_exams(
    CurrentStudent(_student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<OpenExam>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let store = backend.store();
    let exams = repositories::exams::list_open(store)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exams"))?;

    let mut teacher_names: HashMap<String, Option<String>> = HashMap::new();
    let mut listed = Vec::with_capacity(exams.len());
    for exam in exams {
        let teacher_name = match teacher_names.get(&exam.teacher_id) {
            Some(name) => name.clone(),
            None => {
                let name = repositories::profiles::find_by_id(store, &exam.teacher_id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to fetch teacher"))?
                    .map(|teacher| teacher.full_name);
                teacher_names.insert(exam.teacher_id.clone(), name.clone());
                name
            }
        };
        listed.push(OpenExam { exam, teacher_name });
    }

    Ok(Json(listed))
}

async fn submit_exam(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SubmitExam>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let backend = connected_backend(&state).await?;
    let store = backend.store();

    let exam = repositories::exams::find_by_id(store, &exam_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;
    if !exam.status.is_open() {
        return Err(ApiError::BadRequest("Exam is not open for submissions".to_string()));
    }

    let existing = repositories::submissions::find_for_student(store, &exam.id, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check existing submission"))?;
    if existing.is_some() {
        return Err(ApiError::Conflict("You have already submitted this exam".to_string()));
    }

    let new_submission = NewSubmission {
        exam_id: exam.id.clone(),
        student_id: student.id.clone(),
        answers: payload.answers,
        status: SubmissionStatus::Submitted,
    };
    let submission = repositories::submissions::insert(store, &new_submission).await.map_err(|err| {
        match err {
            // Lost a race with a concurrent submit for the same exam.
            StoreError::Rejected { status: 409, .. } => {
                ApiError::Conflict("You have already submitted this exam".to_string())
            }
            err => ApiError::internal(err, "Failed to submit exam"),
        }
    })?;

    tracing::info!(
        action = "submission.submit",
        submission_id = %submission.id,
        exam_id = %exam.id,
        student_id = %student.id,
        "Exam submitted"
    );

    Ok((StatusCode::CREATED, Json(submission)))
}

async fn list_results(
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentResult>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let store = backend.store();
    let results = repositories::results::list_published_for_student(store, &student.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch results"))?;

    let mut listed = Vec::with_capacity(results.len());
    for result in results {
        let exam = repositories::exams::find_by_id(store, &result.exam_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
            .map(|exam| ExamBrief { title: exam.title, subject: exam.subject });
        listed.push(StudentResult { result, exam });
    }

    Ok(Json(listed))
}
