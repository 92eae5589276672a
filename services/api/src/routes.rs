//! API service routes

use std::time::Duration;

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer};

use crate::{middleware::auth_middleware, state::AppState};

pub mod auth;
pub mod deals;
pub mod users;

/// Create the router for the API service
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let protected_routes = Router::new()
        .route("/users", get(users::get_users))
        .route(
            "/users/me",
            get(users::get_current_user)
                .put(users::update_current_user)
                .delete(users::delete_current_user)
                .post(users::create_user),
        )
        .route("/users/me/deals", get(users::get_current_user_deals))
        .route("/deals/", post(deals::create_deal))
        .route(
            "/deals/:deal_id",
            get(deals::get_deal)
                .put(deals::update_deal)
                .delete(deals::delete_deal),
        )
        .route("/deals/:deal_id/users", get(deals::get_deal_users))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/token", post(auth::login))
        .merge(protected_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}
