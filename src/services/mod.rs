pub(crate) mod access;
pub(crate) mod accounts;
pub(crate) mod dashboards;
pub(crate) mod evaluation;
pub(crate) mod grading;
