//! Application state shared across handlers

use sqlx::PgPool;

use crate::{
    jwt::JwtService,
    password::PasswordContext,
    repositories::{DealRepository, UserRepository},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub user_repository: UserRepository,
    pub deal_repository: DealRepository,
    pub jwt_service: JwtService,
    pub password_context: PasswordContext,
}
