//! Deal registry repository
//!
//! Deals are always handed out together with their participant list, loaded
//! in a second keyed query rather than row-by-row. Mutations that touch the
//! deal and its membership run in one transaction.

use std::collections::HashMap;

use sqlx::{FromRow, PgPool};
use tracing::info;

use crate::models::{Deal, DealWithUsers, NewDeal, UpdateDeal, User};

/// Participant row keyed by the deal it belongs to, for batched loads
#[derive(FromRow)]
struct DealParticipant {
    deal_id: i64,
    #[sqlx(flatten)]
    user: User,
}

/// Deal repository for database operations
#[derive(Clone)]
pub struct DealRepository {
    pool: PgPool,
}

impl DealRepository {
    /// Create a new deal repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a deal by ID together with its participants
    pub async fn find_by_id(&self, id: i64) -> Result<Option<DealWithUsers>, sqlx::Error> {
        let deal = sqlx::query_as::<_, Deal>(
            r#"
            SELECT id, title, description, value, created_at, creator_id, status
            FROM deals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match deal {
            Some(deal) => {
                let users = self.participants(deal.id).await?;
                Ok(Some(DealWithUsers { deal, users }))
            }
            None => Ok(None),
        }
    }

    /// Get the participants of a deal
    pub async fn participants(&self, deal_id: i64) -> Result<Vec<User>, sqlx::Error> {
        participants_on(&self.pool, deal_id).await
    }

    /// Create a deal for a user. The creator is enrolled as the first
    /// participant; status starts as `active`; the creation timestamp
    /// defaults to now when the draft does not carry one.
    pub async fn create(
        &self,
        draft: &NewDeal,
        creator: &User,
    ) -> Result<DealWithUsers, sqlx::Error> {
        info!("Creating deal '{}' for user {}", draft.title, creator.id);

        let mut tx = self.pool.begin().await?;

        let deal = sqlx::query_as::<_, Deal>(
            r#"
            INSERT INTO deals (title, description, value, created_at, creator_id)
            VALUES ($1, $2, $3, COALESCE($4, now()), $5)
            RETURNING id, title, description, value, created_at, creator_id, status
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.value)
        .bind(draft.created_at)
        .bind(creator.id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO deal_users (deal_id, user_id)
            VALUES ($1, $2)
            "#,
        )
        .bind(deal.id)
        .bind(creator.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DealWithUsers {
            deal,
            users: vec![creator.clone()],
        })
    }

    /// Apply the fields present in the patch to a deal. A `users` list in
    /// the patch replaces the whole participant set.
    pub async fn update(
        &self,
        id: i64,
        changes: &UpdateDeal,
    ) -> Result<Option<DealWithUsers>, sqlx::Error> {
        let record = match self.find_by_id(id).await? {
            Some(record) => record,
            None => return Ok(None),
        };
        let mut deal = record.deal;
        changes.apply(&mut deal);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Deal>(
            r#"
            UPDATE deals
            SET title = $1, description = $2, value = $3, created_at = $4, status = $5
            WHERE id = $6
            RETURNING id, title, description, value, created_at, creator_id, status
            "#,
        )
        .bind(&deal.title)
        .bind(&deal.description)
        .bind(deal.value)
        .bind(deal.created_at)
        .bind(deal.status)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let deal = match updated {
            Some(deal) => deal,
            None => return Ok(None),
        };

        if let Some(user_ids) = &changes.users {
            sqlx::query(
                r#"
                DELETE FROM deal_users
                WHERE deal_id = $1
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO deal_users (deal_id, user_id)
                SELECT $1, unnest($2::BIGINT[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(id)
            .bind(user_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let users = self.participants(id).await?;
        Ok(Some(DealWithUsers { deal, users }))
    }

    /// Delete a deal by ID, returning the deleted record with the
    /// participants it had. The participant list is captured in the same
    /// transaction as the delete, before the membership rows cascade away.
    pub async fn delete(&self, id: i64) -> Result<Option<DealWithUsers>, sqlx::Error> {
        info!("Deleting deal: {}", id);

        let mut tx = self.pool.begin().await?;

        let users = participants_on(&mut *tx, id).await?;

        let deleted = sqlx::query_as::<_, Deal>(
            r#"
            DELETE FROM deals
            WHERE id = $1
            RETURNING id, title, description, value, created_at, creator_id, status
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(deleted.map(|deal| DealWithUsers { deal, users }))
    }

    /// Get all deals a user participates in, each with its participants.
    /// The participant lists are fetched in one batched query across all
    /// returned deals.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<DealWithUsers>, sqlx::Error> {
        let deals = sqlx::query_as::<_, Deal>(
            r#"
            SELECT d.id, d.title, d.description, d.value, d.created_at, d.creator_id, d.status
            FROM deals d
            INNER JOIN deal_users du ON du.deal_id = d.id
            WHERE du.user_id = $1
            ORDER BY d.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if deals.is_empty() {
            return Ok(Vec::new());
        }

        let deal_ids: Vec<i64> = deals.iter().map(|deal| deal.id).collect();

        let rows = sqlx::query_as::<_, DealParticipant>(
            r#"
            SELECT du.deal_id, u.id, u.name, u.surname, u.patronymic, u.email,
                   u.avatar_filename, u.is_verified, u.is_superuser, u.hashed_password
            FROM deal_users du
            INNER JOIN users u ON u.id = du.user_id
            WHERE du.deal_id = ANY($1)
            ORDER BY du.deal_id, u.id
            "#,
        )
        .bind(&deal_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut participants: HashMap<i64, Vec<User>> = HashMap::new();
        for row in rows {
            participants.entry(row.deal_id).or_default().push(row.user);
        }

        let records = deals
            .into_iter()
            .map(|deal| {
                let users = participants.remove(&deal.id).unwrap_or_default();
                DealWithUsers { deal, users }
            })
            .collect();

        Ok(records)
    }
}

/// Participant query over any executor, so it can run inside a transaction
async fn participants_on<'e, E>(executor: E, deal_id: i64) -> Result<Vec<User>, sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.name, u.surname, u.patronymic, u.email, u.avatar_filename,
               u.is_verified, u.is_superuser, u.hashed_password
        FROM users u
        INNER JOIN deal_users du ON du.user_id = u.id
        WHERE du.deal_id = $1
        ORDER BY u.id
        "#,
    )
    .bind(deal_id)
    .fetch_all(executor)
    .await
}
