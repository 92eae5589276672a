//! User model and related payloads

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity as stored.
///
/// Deliberately not `Serialize`: rows carry the password hash and must never
/// reach a response body directly. Project through [`UserResponse`] instead.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub avatar_filename: Option<String>,
    pub is_verified: bool,
    pub is_superuser: bool,
    pub hashed_password: String,
}

/// New user creation payload (administrative create)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub patronymic: Option<String>,
    pub email: String,
    #[serde(default)]
    pub avatar_filename: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_superuser: bool,
    pub password: String,
}

/// User update payload; `None` leaves the stored field untouched
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub patronymic: Option<String>,
    pub email: Option<String>,
    pub avatar_filename: Option<String>,
}

impl UpdateUser {
    /// Merge the fields present in the patch into the stored row.
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(surname) = &self.surname {
            user.surname = surname.clone();
        }
        if let Some(patronymic) = &self.patronymic {
            user.patronymic = Some(patronymic.clone());
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(avatar_filename) = &self.avatar_filename {
            user.avatar_filename = Some(avatar_filename.clone());
        }
    }
}

/// User projection returned by every read operation.
///
/// Excludes the password hash and the superuser flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub patronymic: Option<String>,
    pub email: String,
    pub avatar_filename: Option<String>,
    pub is_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            surname: user.surname,
            patronymic: user.patronymic,
            email: user.email,
            avatar_filename: user.avatar_filename,
            is_verified: user.is_verified,
        }
    }
}
