//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or invalid caller credential
    #[error("Unauthorized")]
    Unauthorized,

    /// Authorization predicate failed
    #[error("Not enough privileges to perform requested action")]
    Forbidden,

    /// Referenced entity absent, named in the message
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique-constraint violation
    #[error("{0}")]
    Conflict(&'static str),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "Not enough privileges to perform requested action".to_string(),
            ),
            ApiError::NotFound(entity) => {
                (StatusCode::NOT_FOUND, format!("{} not found", entity))
            }
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.to_string()),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
            ApiError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db) = e.as_database_error() {
            if let Some(classified) = classify_database_error(db) {
                return classified;
            }
        }
        ApiError::Database(e)
    }
}

/// Map constraint violations to caller-facing errors. Unique violations
/// become conflicts; a broken membership reference means the referenced
/// row is gone, which callers see as a 404.
fn classify_database_error(db: &dyn sqlx::error::DatabaseError) -> Option<ApiError> {
    if db.is_unique_violation() {
        let error = match db.constraint() {
            Some("ix_users_email") => ApiError::Conflict("Email already registered"),
            _ => ApiError::Conflict("Resource already exists"),
        };
        return Some(error);
    }

    if db.is_foreign_key_violation() {
        let error = match db.constraint() {
            Some("deal_users_user_id_fkey") => ApiError::NotFound("User"),
            Some("deal_users_deal_id_fkey") => ApiError::NotFound("Deal"),
            _ => return None,
        };
        return Some(error);
    }

    None
}
