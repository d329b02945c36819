use thiserror::Error;

use crate::backend::{Backend, IdentityError};
use crate::db::models::Profile;
use crate::db::types::Role;
use crate::repositories;

/// Every way the gate can refuse a request. There is no allow-by-default path.
#[derive(Debug, Error)]
pub(crate) enum AccessError {
    #[error("Not authenticated")]
    MissingCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Could not validate credentials: {0}")]
    ProviderFault(String),
    #[error("User profile not found")]
    ProfileNotFound,
    #[error("Access denied. Required role: {0}")]
    Forbidden(String),
}

/// Extracts the credential from an `Authorization` header value.
pub(crate) fn bearer_token(header: Option<&str>) -> Result<&str, AccessError> {
    let header = header.ok_or(AccessError::MissingCredentials)?;
    let (scheme, token) = header.trim().split_once(' ').ok_or(AccessError::MissingCredentials)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AccessError::MissingCredentials);
    }
    Ok(token)
}

pub(crate) async fn resolve_profile(backend: &Backend, token: &str) -> Result<Profile, AccessError> {
    let user_id = backend.identity().resolve(token).await.map_err(|err| match err {
        IdentityError::InvalidToken => AccessError::InvalidToken,
        other => AccessError::ProviderFault(other.to_string()),
    })?;

    repositories::profiles::find_by_id(backend.store(), &user_id)
        .await
        .map_err(|err| AccessError::ProviderFault(err.to_string()))?
        .ok_or(AccessError::ProfileNotFound)
}

/// Plain set membership: no role implies another.
pub(crate) fn require_role(profile: &Profile, allowed: &[Role]) -> Result<(), AccessError> {
    if allowed.contains(&profile.role) {
        return Ok(());
    }
    let required = allowed.iter().map(|role| role.as_str()).collect::<Vec<_>>().join(" or ");
    Err(AccessError::Forbidden(required))
}

/// The full gate: credential, identity, profile and, when `allowed` is given, role.
pub(crate) async fn authorize(
    backend: &Backend,
    authorization: Option<&str>,
    allowed: Option<&[Role]>,
) -> Result<Profile, AccessError> {
    let token = bearer_token(authorization)?;
    let profile = resolve_profile(backend, token).await?;
    if let Some(allowed) = allowed {
        require_role(&profile, allowed)?;
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_profile, MemoryBackend};

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer  abc ")).unwrap(), "abc");
        assert!(matches!(bearer_token(None), Err(AccessError::MissingCredentials)));
        assert!(matches!(bearer_token(Some("Basic abc")), Err(AccessError::MissingCredentials)));
        assert!(matches!(bearer_token(Some("Bearer ")), Err(AccessError::MissingCredentials)));
    }

    #[tokio::test]
    async fn missing_token_is_denied() {
        let env = MemoryBackend::new();
        let err = authorize(&env.backend, None, None).await.unwrap_err();
        assert!(matches!(err, AccessError::MissingCredentials));
    }

    #[tokio::test]
    async fn invalid_token_is_denied() {
        let env = MemoryBackend::new();
        let err = authorize(&env.backend, Some("Bearer forged"), None).await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidToken));
    }

    #[tokio::test]
    async fn identity_without_profile_is_denied() {
        let env = MemoryBackend::new();
        let token = env.identity_without_profile("ghost@x.com").await;
        let header = format!("Bearer {token}");

        let err = authorize(&env.backend, Some(&header), None).await.unwrap_err();
        assert!(matches!(err, AccessError::ProfileNotFound));
    }

    #[tokio::test]
    async fn role_outside_allowed_set_is_denied() {
        let env = MemoryBackend::new();
        let (_, token) = seed_profile(&env.backend, "admin@x.com", Role::Admin).await;
        let header = format!("Bearer {token}");

        let err =
            authorize(&env.backend, Some(&header), Some(&[Role::Teacher])).await.unwrap_err();
        assert!(matches!(err, AccessError::Forbidden(required) if required == "teacher"));
    }

    #[tokio::test]
    async fn store_fault_during_lookup_denies() {
        let env = MemoryBackend::new();
        let (_, token) = seed_profile(&env.backend, "t@x.com", Role::Teacher).await;
        env.store.fail_next_with_transport();
        let header = format!("Bearer {token}");

        let err = authorize(&env.backend, Some(&header), Some(&[Role::Teacher])).await.unwrap_err();
        assert!(matches!(err, AccessError::ProviderFault(_)));
    }

    #[tokio::test]
    async fn matching_role_returns_profile() {
        let env = MemoryBackend::new();
        let (profile, token) = seed_profile(&env.backend, "t@x.com", Role::Teacher).await;
        let header = format!("Bearer {token}");

        let resolved =
            authorize(&env.backend, Some(&header), Some(&[Role::Teacher])).await.expect("profile");
        assert_eq!(resolved.id, profile.id);
    }
}
