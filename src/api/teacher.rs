use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{connected_backend, CurrentTeacher};
use crate::api::validation::validate_payload;
use crate::backend::store::encode;
use crate::backend::TableStore;
use crate::core::state::AppState;
use crate::db::models::{Exam, Question};
use crate::db::types::{ExamStatus, QuestionType};
use crate::repositories;
use crate::repositories::exams::NewExam;
use crate::repositories::questions::NewQuestion;
use crate::schemas::dashboard::TeacherDashboard;
use crate::schemas::exam::{
    EvaluateSubmission, EvaluationResponse, ExamCreate, ExamCreated, ExamUpdate, QuestionCreate,
    QuestionsAdded,
};
use crate::schemas::submission::SubmissionWithStudent;
use crate::schemas::user::StudentBrief;
use crate::schemas::{non_empty, MessageResponse};
use crate::services::{dashboards, evaluation};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/exams", get(list_exams).post(create_exam))
        .route("/exams/:exam_id", get(get_exam).put(update_exam).delete(delete_exam))
        .route("/exams/:exam_id/questions", get(list_questions).post(add_questions))
        .route("/exams/:exam_id/publish", post(publish_exam))
        .route("/exams/:exam_id/submissions", get(list_submissions))
        .route("/exams/:exam_id/publish-results", post(publish_results))
        .route("/submissions/:submission_id/evaluate", post(evaluate_submission))
}

async fn owned_exam(store: &dyn TableStore, exam_id: &str, teacher_id: &str) -> Result<Exam, ApiError> {
    repositories::exams::find_owned(store, exam_id, teacher_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))
}

async fn dashboard(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<TeacherDashboard>, ApiError> {
    let backend = connected_backend(&state).await?;
    let overview = dashboards::teacher(backend.store(), &teacher.id)
        .await
        .map_err(|e| ApiError::internal(e, "Dashboard error"))?;
    Ok(Json(overview))
}

async fn list_exams(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<Exam>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let exams = repositories::exams::list_by_teacher(backend.store(), &teacher.id, None)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch exams"))?;
    Ok(Json(exams))
}

async fn create_exam(
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ExamCreate>,
) -> Result<(StatusCode, Json<ExamCreated>), ApiError> {
    validate_payload(&payload)?;

    let new_exam = NewExam {
        teacher_id: teacher.id.clone(),
        title: payload.title.trim().to_string(),
        subject: non_empty(payload.subject),
        description: non_empty(payload.description),
        scheduled_at: payload.scheduled_at,
        duration_minutes: payload.duration_minutes,
        total_marks: payload.total_marks,
        status: ExamStatus::Draft,
    };

    let backend = connected_backend(&state).await?;
    let exam = repositories::exams::insert(backend.store(), &new_exam)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create exam"))?;

    tracing::info!(action = "exam.create", exam_id = %exam.id, teacher_id = %teacher.id, "Exam created");

    Ok((StatusCode::CREATED, Json(ExamCreated { message: "Exam created".to_string(), exam })))
}

async fn get_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Exam>, ApiError> {
    let backend = connected_backend(&state).await?;
    Ok(Json(owned_exam(backend.store(), &exam_id, &teacher.id).await?))
}

async fn update_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<ExamUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_payload(&payload)?;

    let patch = encode(&payload).map_err(|e| ApiError::internal(e, "Failed to encode update"))?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    let fields = patch.keys().cloned().collect::<Vec<_>>().join(",");

    let backend = connected_backend(&state).await?;
    repositories::exams::update_owned(backend.store(), &exam_id, &teacher.id, patch)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update exam"))?
        .ok_or_else(|| ApiError::NotFound("Exam not found".to_string()))?;

    tracing::info!(
        action = "exam.update",
        exam_id = %exam_id,
        teacher_id = %teacher.id,
        fields = %fields,
        "Exam updated"
    );

    Ok(Json(MessageResponse::new("Exam updated")))
}

async fn delete_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let backend = connected_backend(&state).await?;
    let removed = repositories::exams::delete_owned(backend.store(), &exam_id, &teacher.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete exam"))?;
    if removed == 0 {
        return Err(ApiError::NotFound("Exam not found".to_string()));
    }

    tracing::info!(action = "exam.delete", exam_id = %exam_id, teacher_id = %teacher.id, "Exam deleted");

    Ok(Json(MessageResponse::new("Exam deleted")))
}

async fn add_questions(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<Vec<QuestionCreate>>,
) -> Result<(StatusCode, Json<QuestionsAdded<Question>>), ApiError> {
    if payload.is_empty() {
        return Err(ApiError::BadRequest("No questions provided".to_string()));
    }
    for question in &payload {
        validate_payload(question)?;
    }

    let backend = connected_backend(&state).await?;
    let exam = owned_exam(backend.store(), &exam_id, &teacher.id).await?;

    let rows = payload
        .into_iter()
        .enumerate()
        .map(|(index, question)| NewQuestion {
            exam_id: exam.id.clone(),
            question_text: question.question_text.trim().to_string(),
            question_type: question.question_type,
            options: match question.question_type {
                QuestionType::Mcq => question.options,
                QuestionType::Text => None,
            },
            correct_answer: non_empty(question.correct_answer),
            marks: question.marks,
            order_num: question.order_num.unwrap_or(index as i32 + 1),
        })
        .collect::<Vec<_>>();

    let questions = repositories::questions::insert_many(backend.store(), &rows)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to add questions"))?;

    tracing::info!(
        action = "exam.questions.add",
        exam_id = %exam.id,
        teacher_id = %teacher.id,
        count = questions.len(),
        "Questions added"
    );

    Ok((
        StatusCode::CREATED,
        Json(QuestionsAdded { message: format!("{} questions added", questions.len()), questions }),
    ))
}

async fn list_questions(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<Question>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let exam = owned_exam(backend.store(), &exam_id, &teacher.id).await?;
    let questions = repositories::questions::list_for_exam(backend.store(), &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    Ok(Json(questions))
}

async fn publish_exam(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let backend = connected_backend(&state).await?;
    evaluation::schedule_exam(backend.store(), &teacher, &exam_id).await?;
    Ok(Json(MessageResponse::new("Exam scheduled successfully")))
}

async fn list_submissions(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionWithStudent>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let store = backend.store();
    let exam = owned_exam(store, &exam_id, &teacher.id).await?;

    let submissions = repositories::submissions::list_for_exam(store, &exam.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch submissions"))?;

    let mut enriched = Vec::with_capacity(submissions.len());
    for submission in submissions {
        let student = repositories::profiles::find_by_id(store, &submission.student_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
            .map(StudentBrief::from);
        enriched.push(SubmissionWithStudent { submission, student });
    }

    Ok(Json(enriched))
}

async fn evaluate_submission(
    Path(submission_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
    Json(payload): Json<EvaluateSubmission>,
) -> Result<Json<EvaluationResponse>, ApiError> {
    validate_payload(&payload)?;

    let backend = connected_backend(&state).await?;
    let outcome = evaluation::evaluate(
        backend.store(),
        &teacher,
        &submission_id,
        payload.marks_obtained,
        non_empty(payload.remarks),
    )
    .await?;

    Ok(Json(EvaluationResponse {
        message: "Submission evaluated".to_string(),
        grade: outcome.grade,
        percentage: outcome.percentage,
    }))
}

async fn publish_results(
    Path(exam_id): Path<String>,
    CurrentTeacher(teacher): CurrentTeacher,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    let backend = connected_backend(&state).await?;
    evaluation::publish_results(backend.store(), &teacher, &exam_id).await?;
    Ok(Json(MessageResponse::new("Results published successfully")))
}
