use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{connected_backend, CurrentAdmin};
use crate::api::validation::validate_payload;
use crate::backend::store::encode;
use crate::core::state::AppState;
use crate::db::models::Profile;
use crate::repositories;
use crate::schemas::dashboard::AdminDashboard;
use crate::schemas::user::{UserCreatedResponse, UserListQuery, UserRegister, UserUpdate};
use crate::schemas::{non_empty, MessageResponse};
use crate::services::accounts::{self, AccountError, NewAccount};
use crate::services::dashboards;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:user_id", get(get_user).put(update_user).delete(delete_user))
}

async fn dashboard(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AdminDashboard>, ApiError> {
    let backend = connected_backend(&state).await?;
    let overview = dashboards::admin(backend.store())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch dashboard"))?;
    Ok(Json(overview))
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, ApiError> {
    let backend = connected_backend(&state).await?;
    let users = repositories::profiles::list(backend.store(), params.role)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch users"))?;
    Ok(Json(users))
}

async fn create_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserRegister>,
) -> Result<(StatusCode, Json<UserCreatedResponse>), ApiError> {
    validate_payload(&payload)?;

    let account = NewAccount {
        email: payload.email.trim().to_string(),
        password: payload.password,
        full_name: payload.full_name.trim().to_string(),
        role: payload.role,
        gender: payload.gender,
        department: non_empty(payload.department),
        reg_number: non_empty(payload.reg_number),
    };

    let backend = connected_backend(&state).await?;
    let profile = accounts::provision(&backend, &account).await.map_err(|err| {
        if err.is_duplicate() {
            ApiError::Conflict("User with this email already exists".to_string())
        } else {
            ApiError::internal(err, "Failed to create user")
        }
    })?;

    tracing::info!(
        action = "admin.user.create",
        admin_id = %admin.id,
        user_id = %profile.id,
        role = profile.role.as_str(),
        "User created by admin"
    );

    Ok((
        StatusCode::CREATED,
        Json(UserCreatedResponse {
            message: "User created successfully".to_string(),
            user_id: profile.id,
        }),
    ))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Profile>, ApiError> {
    let backend = connected_backend(&state).await?;
    let profile = repositories::profiles::find_by_id(backend.store(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
    Ok(Json(profile))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_payload(&payload)?;

    let patch = encode(&payload).map_err(|e| ApiError::internal(e, "Failed to encode update"))?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    let fields = patch.keys().cloned().collect::<Vec<_>>().join(",");

    let backend = connected_backend(&state).await?;
    repositories::profiles::update(backend.store(), &user_id, patch)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        action = "admin.user.update",
        admin_id = %admin.id,
        user_id = %user_id,
        fields = %fields,
        "User updated by admin"
    );

    Ok(Json(MessageResponse::new("User updated successfully")))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    if user_id == admin.id {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }

    let backend = connected_backend(&state).await?;
    accounts::remove(&backend, &user_id).await.map_err(|err| match err {
        AccountError::NotFound => ApiError::NotFound("User not found".to_string()),
        err => ApiError::internal(err, "Failed to delete user"),
    })?;

    tracing::info!(
        action = "admin.user.delete",
        admin_id = %admin.id,
        user_id = %user_id,
        "User deleted by admin"
    );

    Ok(Json(MessageResponse::new("User deleted successfully")))
}
