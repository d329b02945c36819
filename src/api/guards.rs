use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::backend::Backend;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::db::types::Role;
use crate::services::access::{self, AccessError};

pub(crate) struct CurrentProfile(pub(crate) Profile);
pub(crate) struct CurrentAdmin(pub(crate) Profile);
pub(crate) struct CurrentTeacher(pub(crate) Profile);
pub(crate) struct CurrentStudent(pub(crate) Profile);

pub(crate) async fn connected_backend(state: &AppState) -> Result<Backend, ApiError> {
    state.backend().get().await.map_err(|e| ApiError::internal(e, "Backend unavailable"))
}

async fn gate(parts: &Parts, state: &AppState, allowed: Option<&[Role]>) -> Result<Profile, ApiError> {
    let authorization = parts.headers.get(header::AUTHORIZATION).and_then(|value| value.to_str().ok());
    // Reject a missing credential before touching the backend.
    access::bearer_token(authorization)?;

    let backend = state
        .backend()
        .get()
        .await
        .map_err(|err| AccessError::ProviderFault(err.to_string()))?;
    Ok(access::authorize(&backend, authorization, allowed).await?)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentProfile {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, None).await.map(CurrentProfile)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, Some(&[Role::Admin])).await.map(CurrentAdmin)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentTeacher {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, Some(&[Role::Teacher])).await.map(CurrentTeacher)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStudent {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        gate(parts, state, Some(&[Role::Student])).await.map(CurrentStudent)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header, Method, StatusCode};
    use tower::ServiceExt;

    use crate::api;
    use crate::backend::BackendHandle;
    use crate::core::state::AppState;
    use crate::test_support;

    #[tokio::test]
    async fn unconfigured_backend_rejects_as_unauthenticated() {
        let ctx = test_support::setup_test_context().await;
        // The hosted connector refuses to build clients without a service key.
        let backend = BackendHandle::from_settings(ctx.state.settings()).expect("connector");
        let state =
            AppState::new(ctx.state.settings().clone(), backend, ctx.state.redis().clone());
        let app = api::router::router(state);

        let response = app
            .oneshot(test_support::json_request(
                Method::GET,
                "/api/teacher/dashboard",
                Some("some-token"),
                None,
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        let body = test_support::read_json(response).await;
        let detail = body["detail"].as_str().expect("detail");
        assert!(detail.contains("SUPABASE_SERVICE_KEY"), "detail: {detail}");
    }
}
