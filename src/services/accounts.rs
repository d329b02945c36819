use thiserror::Error;

use crate::backend::{Backend, IdentityError, StoreError};
use crate::db::models::Profile;
use crate::db::types::{Gender, Role};
use crate::repositories;
use crate::repositories::profiles::NewProfile;

#[derive(Debug, Error)]
pub(crate) enum AccountError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("User not found")]
    NotFound,
}

impl AccountError {
    pub(crate) fn is_resource_busy(&self) -> bool {
        match self {
            AccountError::Identity(err) => err.is_resource_busy(),
            AccountError::Store(err) => err.is_resource_busy(),
            AccountError::NotFound => false,
        }
    }

    /// The email is taken, either in the identity provider or as a profile row.
    pub(crate) fn is_duplicate(&self) -> bool {
        matches!(
            self,
            AccountError::Identity(IdentityError::AlreadyExists(_))
                | AccountError::Store(StoreError::Rejected { status: 409, .. })
        )
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NewAccount {
    pub(crate) email: String,
    pub(crate) password: String,
    pub(crate) full_name: String,
    pub(crate) role: Role,
    pub(crate) gender: Option<Gender>,
    pub(crate) department: Option<String>,
    pub(crate) reg_number: Option<String>,
}

/// Creates the identity, then the profile keyed by the identity's id.
///
/// When the profile insert fails the identity is deleted again so that a retry
/// starts from nothing.
pub(crate) async fn provision(backend: &Backend, account: &NewAccount) -> Result<Profile, AccountError> {
    let identity = backend.identity();
    let user_id = identity.create_identity(&account.email, &account.password).await?;

    let profile = NewProfile {
        id: user_id.clone(),
        email: account.email.clone(),
        full_name: account.full_name.clone(),
        role: account.role,
        department: account.department.clone(),
        reg_number: account.reg_number.clone(),
        gender: account.gender,
    };

    match repositories::profiles::insert(backend.store(), &profile).await {
        Ok(profile) => Ok(profile),
        Err(err) => {
            if let Err(cleanup) = identity.delete_identity(&user_id).await {
                tracing::warn!(
                    user_id = %user_id,
                    error = %cleanup,
                    "Failed to remove identity after profile insert failed"
                );
            }
            Err(err.into())
        }
    }
}

/// Removes the profile first, then the identity behind it.
pub(crate) async fn remove(backend: &Backend, user_id: &str) -> Result<(), AccountError> {
    if repositories::profiles::delete(backend.store(), user_id).await? == 0 {
        return Err(AccountError::NotFound);
    }

    match backend.identity().delete_identity(user_id).await {
        Ok(()) => Ok(()),
        Err(IdentityError::NotFound) => {
            tracing::warn!(user_id = %user_id, "Profile removed but identity was already gone");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
