use async_trait::async_trait;

use super::error::IdentityError;

#[derive(Debug, Clone)]
pub(crate) struct AuthSession {
    pub(crate) user_id: String,
    pub(crate) access_token: String,
}

/// Owns credentials and session tokens. Profiles live in the table store.
#[async_trait]
pub(crate) trait IdentityProvider: Send + Sync {
    /// Maps a bearer token to the user id it was issued for.
    async fn resolve(&self, token: &str) -> Result<String, IdentityError>;

    async fn create_identity(&self, email: &str, password: &str) -> Result<String, IdentityError>;

    async fn verify_password(&self, email: &str, password: &str)
        -> Result<AuthSession, IdentityError>;

    async fn delete_identity(&self, user_id: &str) -> Result<(), IdentityError>;
}
