use serde::Serialize;

use crate::db::models::Exam;

#[derive(Debug, Serialize)]
pub(crate) struct AdminDashboard {
    pub(crate) total_users: u64,
    pub(crate) total_teachers: u64,
    pub(crate) total_students: u64,
    pub(crate) total_exams: u64,
    pub(crate) total_submissions: u64,
    pub(crate) recent_exams: Vec<Exam>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TeacherDashboard {
    pub(crate) total_exams: u64,
    pub(crate) active_exams: u64,
    pub(crate) total_submissions: u64,
    pub(crate) pending_evaluations: u64,
    pub(crate) recent_exams: Vec<Exam>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentDashboard {
    pub(crate) upcoming_exams: Vec<Exam>,
    pub(crate) total_submissions: u64,
    pub(crate) completed_exams: u64,
    pub(crate) average_percentage: Option<f64>,
}
