use crate::backend::{StoreError, TableStore};
use crate::db::types::{Role, SubmissionStatus};
use crate::repositories;
use crate::schemas::dashboard::{AdminDashboard, StudentDashboard, TeacherDashboard};

const RECENT_EXAMS: u32 = 5;

pub(crate) async fn admin(store: &dyn TableStore) -> Result<AdminDashboard, StoreError> {
    Ok(AdminDashboard {
        total_users: repositories::profiles::count(store, None).await?,
        total_teachers: repositories::profiles::count(store, Some(Role::Teacher)).await?,
        total_students: repositories::profiles::count(store, Some(Role::Student)).await?,
        total_exams: repositories::exams::count(store).await?,
        total_submissions: repositories::submissions::count(store).await?,
        recent_exams: repositories::exams::list_recent(store, RECENT_EXAMS).await?,
    })
}

pub(crate) async fn teacher(
    store: &dyn TableStore,
    teacher_id: &str,
) -> Result<TeacherDashboard, StoreError> {
    let exams = repositories::exams::list_by_teacher(store, teacher_id, None).await?;

    let mut total_submissions = 0;
    let mut pending_evaluations = 0;
    for exam in &exams {
        total_submissions += repositories::submissions::count_for_exam(store, &exam.id, None).await?;
        pending_evaluations += repositories::submissions::count_for_exam(
            store,
            &exam.id,
            Some(SubmissionStatus::Submitted),
        )
        .await?;
    }

    Ok(TeacherDashboard {
        total_exams: exams.len() as u64,
        active_exams: exams.iter().filter(|exam| exam.status.is_open()).count() as u64,
        total_submissions,
        pending_evaluations,
        recent_exams: exams.into_iter().take(RECENT_EXAMS as usize).collect(),
    })
}

pub(crate) async fn student(
    store: &dyn TableStore,
    student_id: &str,
) -> Result<StudentDashboard, StoreError> {
    let published = repositories::results::list_published_for_student(store, student_id).await?;
    let average_percentage = if published.is_empty() {
        None
    } else {
        let sum: f64 = published.iter().map(|result| result.percentage).sum();
        Some((sum / published.len() as f64 * 100.0).round() / 100.0)
    };

    Ok(StudentDashboard {
        upcoming_exams: repositories::exams::list_open(store).await?,
        total_submissions: repositories::submissions::count_for_student(store, student_id, None)
            .await?,
        completed_exams: repositories::submissions::count_for_student(
            store,
            student_id,
            Some(SubmissionStatus::Evaluated),
        )
        .await?,
        average_percentage,
    })
}
