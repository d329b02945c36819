use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::error::IdentityError;
use super::identity::{AuthSession, IdentityProvider};
use super::rest::rejection;

/// Hosted auth service (`/auth/v1`). Token checks use the public key,
/// admin operations the service key.
pub(crate) struct GoTrueIdentity {
    client: Client,
    auth_url: String,
    anon_key: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

impl GoTrueIdentity {
    pub(crate) fn new(client: Client, url: &str, anon_key: String, service_key: String) -> Self {
        Self {
            client,
            auth_url: format!("{}/auth/v1", url.trim_end_matches('/')),
            anon_key,
            service_key,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn resolve(&self, token: &str) -> Result<String, IdentityError> {
        let response = self
            .client
            .get(format!("{}/user", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<AuthUser>().await?.id),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(IdentityError::InvalidToken)
            }
            _ => {
                let (status, message) = rejection(response).await;
                Err(IdentityError::Rejected { status, message })
            }
        }
    }

    async fn create_identity(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        let response = self
            .client
            .post(format!("{}/admin/users", self.auth_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({ "email": email, "password": password, "email_confirm": true }))
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json::<AuthUser>().await?.id);
        }

        let (status, message) = rejection(response).await;
        let duplicate = message.to_ascii_lowercase().contains("already");
        if duplicate && (status == 422 || status == 400 || status == 409) {
            return Err(IdentityError::AlreadyExists(email.to_string()));
        }
        Err(IdentityError::Rejected { status, message })
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError> {
        let response = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let token: TokenResponse = response.json().await?;
                Ok(AuthSession { user_id: token.user.id, access_token: token.access_token })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(IdentityError::InvalidCredentials)
            }
            _ => {
                let (status, message) = rejection(response).await;
                Err(IdentityError::Rejected { status, message })
            }
        }
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), IdentityError> {
        let response = self
            .client
            .delete(format!("{}/admin/users/{user_id}", self.auth_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IdentityError::NotFound),
            _ => {
                let (status, message) = rejection(response).await;
                Err(IdentityError::Rejected { status, message })
            }
        }
    }
}
