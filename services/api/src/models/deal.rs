//! Deal model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::{User, UserResponse};

/// Lifecycle status of a deal, stored as the `deal_status` Postgres enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "deal_status", rename_all = "lowercase")]
pub enum DealStatus {
    #[default]
    Active,
    Successful,
    Denied,
}

/// Deal entity as stored
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub creator_id: i64,
    pub status: DealStatus,
}

/// Deal row together with its eager-loaded participants
#[derive(Debug, Clone, PartialEq)]
pub struct DealWithUsers {
    pub deal: Deal,
    pub users: Vec<User>,
}

/// New deal creation payload; the server assigns creator and status,
/// and the creation timestamp when the draft does not carry one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeal {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Deal update payload; `None` leaves the stored field untouched.
///
/// `users`, when present, replaces the whole participant set with the given
/// user ids. The creator reference is not updatable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDeal {
    pub title: Option<String>,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
    pub status: Option<DealStatus>,
    pub users: Option<Vec<i64>>,
}

impl UpdateDeal {
    /// Merge the scalar fields present in the patch into the stored row.
    /// Membership replacement (`users`) is handled by the registry.
    pub fn apply(&self, deal: &mut Deal) {
        if let Some(title) = &self.title {
            deal.title = title.clone();
        }
        if let Some(description) = &self.description {
            deal.description = Some(description.clone());
        }
        if let Some(value) = self.value {
            deal.value = Some(value);
        }
        if let Some(created_at) = self.created_at {
            deal.created_at = created_at;
        }
        if let Some(status) = self.status {
            deal.status = status;
        }
    }
}

/// Deal projection returned by every read operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub creator_id: i64,
    pub status: DealStatus,
    pub users: Vec<UserResponse>,
}

impl From<DealWithUsers> for DealResponse {
    fn from(record: DealWithUsers) -> Self {
        let DealWithUsers { deal, users } = record;
        Self {
            id: deal.id,
            title: deal.title,
            description: deal.description,
            value: deal.value,
            created_at: deal.created_at,
            creator_id: deal.creator_id,
            status: deal.status,
            users: users.into_iter().map(UserResponse::from).collect(),
        }
    }
}
