//! Data model: entities, patch payloads, and response projections

pub mod deal;
pub mod user;

// Re-export for convenience
pub use deal::{Deal, DealResponse, DealStatus, DealWithUsers, NewDeal, UpdateDeal};
pub use user::{NewUser, UpdateUser, User, UserResponse};
