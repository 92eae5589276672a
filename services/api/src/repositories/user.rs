//! User directory repository

use sqlx::PgPool;
use tracing::info;

use crate::models::{NewUser, UpdateUser, User};

/// User repository for database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get all users
    pub async fn list(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, surname, patronymic, email, avatar_filename,
                   is_verified, is_superuser, hashed_password
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, surname, patronymic, email, avatar_filename,
                   is_verified, is_superuser, hashed_password
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, surname, patronymic, email, avatar_filename,
                   is_verified, is_superuser, hashed_password
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    /// Return the existing user for this email, or insert a bare record
    /// carrying only the email. Concurrent calls may race on the insert;
    /// the loser reads back the winner's row.
    pub async fn get_or_create_by_email(&self, email: &str) -> Result<User, sqlx::Error> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }

        info!("Creating user record for email: {}", email);

        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email)
            VALUES ($1)
            RETURNING id, name, surname, patronymic, email, avatar_filename,
                      is_verified, is_superuser, hashed_password
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => match self.find_by_email(email).await? {
                Some(user) => Ok(user),
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Create a new user. Callers hash the password first; only the hash
    /// is persisted.
    pub async fn create(
        &self,
        new_user: &NewUser,
        hashed_password: &str,
    ) -> Result<User, sqlx::Error> {
        info!("Creating new user: {}", new_user.email);

        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, surname, patronymic, email, avatar_filename,
                               is_verified, is_superuser, hashed_password)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, surname, patronymic, email, avatar_filename,
                      is_verified, is_superuser, hashed_password
            "#,
        )
        .bind(&new_user.name)
        .bind(&new_user.surname)
        .bind(&new_user.patronymic)
        .bind(&new_user.email)
        .bind(&new_user.avatar_filename)
        .bind(new_user.is_verified)
        .bind(new_user.is_superuser)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
    }

    /// Apply the fields present in the patch to a user
    pub async fn update(
        &self,
        id: i64,
        changes: &UpdateUser,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user = match self.find_by_id(id).await? {
            Some(user) => user,
            None => return Ok(None),
        };
        changes.apply(&mut user);

        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, surname = $2, patronymic = $3, email = $4, avatar_filename = $5
            WHERE id = $6
            RETURNING id, name, surname, patronymic, email, avatar_filename,
                      is_verified, is_superuser, hashed_password
            "#,
        )
        .bind(&user.name)
        .bind(&user.surname)
        .bind(&user.patronymic)
        .bind(&user.email)
        .bind(&user.avatar_filename)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a user by ID, returning the deleted record. Membership rows
    /// referencing the user cascade away.
    pub async fn delete(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        info!("Deleting user: {}", id);

        sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
            WHERE id = $1
            RETURNING id, name, surname, patronymic, email, avatar_filename,
                      is_verified, is_superuser, hashed_password
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Privilege query: the superuser flag for a user, if the user exists
    pub async fn is_superuser(&self, id: i64) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT is_superuser
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
