//! User directory routes
//!
//! Every operation here acts on the caller's own record, resolved from the
//! bearer token, except listing and creating users which are gated on the
//! superuser flag.

use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::error;

use crate::{
    access,
    error::ApiError,
    middleware::AuthUser,
    models::{DealResponse, NewUser, UpdateUser, UserResponse},
    state::AppState,
};

/// Get all users (superuser only)
pub async fn get_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !access::may_administer_users(&caller) {
        return Err(ApiError::Forbidden);
    }

    let users = state.user_repository.list().await?;
    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(users))
}

/// Get the caller's own record
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(UserResponse::from(user)))
}

/// Apply a partial update to the caller's own record
pub async fn update_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<UpdateUser>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .user_repository
        .update(auth_user.id, &payload)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(UserResponse::from(updated)))
}

/// Delete the caller's own record, returning it
pub async fn delete_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .user_repository
        .delete(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(UserResponse::from(deleted)))
}

/// Get all deals the caller participates in
pub async fn get_current_user_deals(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let deals = state.deal_repository.list_for_user(user.id).await?;
    let deals: Vec<DealResponse> = deals.into_iter().map(DealResponse::from).collect();

    Ok(Json(deals))
}

/// Administrative create (superuser only)
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    let is_superuser = state
        .user_repository
        .is_superuser(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("Admin"))?;

    if !is_superuser {
        return Err(ApiError::Forbidden);
    }

    let hashed_password = state.password_context.hash(&payload.password).map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::InternalServerError
    })?;

    let user = state
        .user_repository
        .create(&payload, &hashed_password)
        .await?;

    Ok(Json(UserResponse::from(user)))
}
