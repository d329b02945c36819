use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::error::IdentityError;
use super::identity::{AuthSession, IdentityProvider};
use super::query::{Query, Row, Table};
use super::store::{decode, TableStore};
use crate::core::config::SecuritySettings;
use crate::core::security::{create_access_token, hash_password, verify_password, verify_token};

/// Self-hosted identity: argon2 hashes in `auth_identities`, HS256 access tokens.
pub(crate) struct LocalIdentity {
    store: Arc<dyn TableStore>,
    security: SecuritySettings,
}

#[derive(Debug, Deserialize)]
struct IdentityRecord {
    id: String,
    email: String,
    hashed_password: String,
}

impl LocalIdentity {
    pub(crate) fn new(store: Arc<dyn TableStore>, security: SecuritySettings) -> Self {
        Self { store, security }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, IdentityError> {
        let query = Query::table(Table::AuthIdentities).eq("email", normalize_email(email));
        match self.store.select_optional(&query).await? {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn resolve(&self, token: &str) -> Result<String, IdentityError> {
        let claims = verify_token(token, &self.security).map_err(|_| IdentityError::InvalidToken)?;
        let query = Query::table(Table::AuthIdentities).eq("id", claims.sub.clone());

        match self.store.select_optional(&query).await? {
            Some(_) => Ok(claims.sub),
            None => Err(IdentityError::InvalidToken),
        }
    }

    async fn create_identity(&self, email: &str, password: &str) -> Result<String, IdentityError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(IdentityError::AlreadyExists(email.to_string()));
        }

        let mut row = Row::new();
        row.insert("email".into(), Value::from(normalize_email(email)));
        row.insert("hashed_password".into(), Value::from(hash_password(password)?));
        let stored: IdentityRecord = decode(self.store.insert_one(Table::AuthIdentities, row).await?)?;

        tracing::info!(user_id = %stored.id, "Identity created");
        Ok(stored.id)
    }

    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, IdentityError> {
        let record = self.find_by_email(email).await?.ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(password, &record.hashed_password)? {
            return Err(IdentityError::InvalidCredentials);
        }

        let access_token = create_access_token(&record.id, &record.email, &self.security, None)?;
        Ok(AuthSession { user_id: record.id, access_token })
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), IdentityError> {
        let removed =
            self.store.delete(&Query::table(Table::AuthIdentities).eq("id", user_id)).await?;
        if removed == 0 {
            return Err(IdentityError::NotFound);
        }
        Ok(())
    }
}
