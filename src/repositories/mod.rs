pub(crate) mod exams;
pub(crate) mod health;
pub(crate) mod profiles;
pub(crate) mod questions;
pub(crate) mod results;
pub(crate) mod submissions;
