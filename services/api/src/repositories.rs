//! Repositories for database operations

pub mod deal;
pub mod user;

pub use deal::DealRepository;
pub use user::UserRepository;
