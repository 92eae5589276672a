//! Deal registry routes
//!
//! Every deal-scoped handler runs the same check chain: resolve the deal
//! (404), resolve the caller (404), evaluate the authorization predicate
//! (403), then perform the operation.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    access,
    error::ApiError,
    middleware::AuthUser,
    models::{DealResponse, NewDeal, UpdateDeal, UserResponse},
    state::AppState,
};

/// Get a deal with its participants
pub async fn get_deal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(deal_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state
        .deal_repository
        .find_by_id(deal_id)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    let caller = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !access::may_access_deal(&caller, &deal) {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(DealResponse::from(deal)))
}

/// Get the participants of a deal
pub async fn get_deal_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(deal_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state
        .deal_repository
        .find_by_id(deal_id)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    let caller = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !access::may_access_deal(&caller, &deal) {
        return Err(ApiError::Forbidden);
    }

    let users: Vec<UserResponse> = deal.users.into_iter().map(UserResponse::from).collect();

    Ok(Json(users))
}

/// Create a deal; the caller becomes its creator
pub async fn create_deal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(payload): Json<NewDeal>,
) -> Result<impl IntoResponse, ApiError> {
    let creator = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let deal = state.deal_repository.create(&payload, &creator).await?;

    Ok(Json(DealResponse::from(deal)))
}

/// Apply a partial update to a deal
pub async fn update_deal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(deal_id): Path<i64>,
    Json(payload): Json<UpdateDeal>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state
        .deal_repository
        .find_by_id(deal_id)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    let caller = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !access::may_access_deal(&caller, &deal) {
        return Err(ApiError::Forbidden);
    }

    let updated = state
        .deal_repository
        .update(deal_id, &payload)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    Ok(Json(DealResponse::from(updated)))
}

/// Delete a deal (creator only), returning the deleted record
pub async fn delete_deal(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(deal_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state
        .deal_repository
        .find_by_id(deal_id)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    let caller = state
        .user_repository
        .find_by_id(auth_user.id)
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !access::may_delete_deal(&caller, &deal) {
        return Err(ApiError::Forbidden);
    }

    let deleted = state
        .deal_repository
        .delete(deal_id)
        .await?
        .ok_or(ApiError::NotFound("Deal"))?;

    Ok(Json(DealResponse::from(deleted)))
}
