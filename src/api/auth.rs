use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::api::errors::ApiError;
use crate::api::guards::{connected_backend, CurrentProfile};
use crate::api::validation::validate_payload;
use crate::backend::{Backend, IdentityError, StoreError};
use crate::core::redis::AuthAction;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::db::types::Role;
use crate::repositories;
use crate::schemas::auth::TokenResponse;
use crate::schemas::non_empty;
use crate::schemas::user::{RegisterResponse, UserLogin, UserRegister, UserSummary};
use crate::services::accounts::{self, AccountError, NewAccount};

/// The first attempt plus one retry after a backend reset.
const BUSY_ATTEMPTS: usize = 2;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

#[derive(Debug, Error)]
enum LoginError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoginError {
    fn is_resource_busy(&self) -> bool {
        match self {
            LoginError::Identity(err) => err.is_resource_busy(),
            LoginError::Store(err) => err.is_resource_busy(),
        }
    }
}

async fn check_rate_limit(
    state: &AppState,
    action: AuthAction,
    email: &str,
) -> Result<(), ApiError> {
    if state.redis().allow_auth_attempt(action, email).await {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests("Too many attempts, try again later"))
    }
}

async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<UserRegister>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_string();
    validate_payload(&payload)?;
    if payload.role == Role::Admin {
        return Err(ApiError::BadRequest("Role must be student or teacher".to_string()));
    }
    check_rate_limit(&state, AuthAction::Register, &payload.email).await?;

    let account = NewAccount {
        email: payload.email,
        password: payload.password,
        full_name: payload.full_name.trim().to_string(),
        role: payload.role,
        gender: payload.gender,
        department: non_empty(payload.department),
        reg_number: non_empty(payload.reg_number),
    };

    let mut attempt = 1;
    let outcome = loop {
        let backend = connected_backend(&state).await?;
        match accounts::provision(&backend, &account).await {
            Err(err) if err.is_resource_busy() && attempt < BUSY_ATTEMPTS => {
                tracing::warn!(error = %err, attempt, "Registration hit a busy socket; retrying");
                state.backend().reset().await;
                attempt += 1;
            }
            outcome => break outcome,
        }
    };

    let profile = outcome.map_err(|err| match err {
        err if err.is_duplicate() => {
            ApiError::Conflict("User with this email already exists".to_string())
        }
        AccountError::Identity(IdentityError::Rejected { message, .. }) => {
            ApiError::BadRequest(format!("Registration failed: {message}"))
        }
        err => ApiError::internal(err, "Registration failed"),
    })?;

    tracing::info!(
        action = "user.register",
        user_id = %profile.id,
        role = profile.role.as_str(),
        "User registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            user: UserSummary::from(&profile),
        }),
    ))
}

async fn login_once(backend: &Backend, credentials: &UserLogin) -> Result<TokenResponse, LoginError> {
    let session =
        backend.identity().verify_password(&credentials.email, &credentials.password).await?;
    let profile = repositories::profiles::find_by_id(backend.store(), &session.user_id).await?;

    let user = match profile {
        Some(profile) => profile_json(&profile)?,
        None => json!({ "id": session.user_id, "email": credentials.email }),
    };

    Ok(TokenResponse { access_token: session.access_token, token_type: "bearer".to_string(), user })
}

fn profile_json(profile: &Profile) -> Result<Value, StoreError> {
    serde_json::to_value(profile).map_err(|err| StoreError::Decode(err.to_string()))
}

async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<UserLogin>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_string();
    validate_payload(&payload)?;
    check_rate_limit(&state, AuthAction::Login, &payload.email).await?;

    let mut attempt = 1;
    let outcome = loop {
        let backend = connected_backend(&state).await?;
        match login_once(&backend, &payload).await {
            Err(err) if err.is_resource_busy() && attempt < BUSY_ATTEMPTS => {
                tracing::warn!(error = %err, attempt, "Login hit a busy socket; retrying");
                state.backend().reset().await;
                attempt += 1;
            }
            outcome => break outcome,
        }
    };

    let response = outcome.map_err(|err| match err {
        LoginError::Identity(IdentityError::InvalidCredentials) => {
            ApiError::Unauthorized("Invalid email or password".to_string())
        }
        err => {
            tracing::error!(error = %err, "Login failed");
            ApiError::Unauthorized(format!("Login failed: {err}"))
        }
    })?;

    Ok(Json(response))
}

async fn me(CurrentProfile(profile): CurrentProfile) -> Json<Profile> {
    Json(profile)
}
