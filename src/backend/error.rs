use thiserror::Error;

use crate::core::security::SecurityError;

/// Linux `EBUSY`. Serverless sandboxes raise it when asked for an IPv6 socket.
const EBUSY: i32 = 16;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("device or resource busy: {0}")]
    ResourceBusy(String),
    #[error("store request failed: {0}")]
    Transport(String),
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("expected exactly one row, found none")]
    NoRows,
    #[error("expected exactly one row, found {0}")]
    MultipleRows(usize),
    #[error("malformed row: {0}")]
    Decode(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("backend is not configured: {0}")]
    Configuration(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub(crate) fn is_resource_busy(&self) -> bool {
        matches!(self, StoreError::ResourceBusy(_))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if is_resource_busy_fault(&err) {
            StoreError::ResourceBusy(err.to_string())
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_resource_busy_fault(&err) {
            StoreError::ResourceBusy(err.to_string())
        } else {
            StoreError::Database(err)
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum IdentityError {
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("a user with email {0} is already registered")]
    AlreadyExists(String),
    #[error("identity not found")]
    NotFound,
    #[error("device or resource busy: {0}")]
    ResourceBusy(String),
    #[error("identity provider request failed: {0}")]
    Transport(String),
    #[error("identity provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity provider is not configured: {0}")]
    Configuration(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Security(#[from] SecurityError),
}

impl IdentityError {
    pub(crate) fn is_resource_busy(&self) -> bool {
        match self {
            IdentityError::ResourceBusy(_) => true,
            IdentityError::Store(err) => err.is_resource_busy(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if is_resource_busy_fault(&err) {
            IdentityError::ResourceBusy(err.to_string())
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

/// Walks the source chain looking for the OS-level busy fault.
/// HTTP clients wrap the socket error a few layers deep, so both the raw errno
/// and the rendered message are checked.
pub(crate) fn is_resource_busy_fault(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(error) = current {
        if let Some(io) = error.downcast_ref::<std::io::Error>() {
            if io.raw_os_error() == Some(EBUSY) {
                return true;
            }
        }
        if error.to_string().contains("Device or resource busy") {
            return true;
        }
        current = error.source();
    }
    false
}
