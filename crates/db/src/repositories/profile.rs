use sqlx::{sqlite::SqliteRow, Row};

use yesfree_core::domain::user::{MembershipTier, UserId, UserProfile};
use yesfree_core::stores::{ProfileStore, StoreError};

use super::db_error;
use crate::DbPool;

pub struct SqlProfileStore {
    pool: DbPool,
}

impl SqlProfileStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileStore for SqlProfileStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT user_id, tier, points FROM user_profile WHERE user_id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(profile_from_row).transpose()
    }

    async fn save(&self, profile: UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_profile (user_id, tier, points) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                tier = excluded.tier,
                points = excluded.points",
        )
        .bind(&profile.user_id.0)
        .bind(profile.tier.as_str())
        .bind(profile.points)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn set_tier(&self, user_id: &UserId, tier: MembershipTier) -> Result<(), StoreError> {
        sqlx::query("UPDATE user_profile SET tier = ? WHERE user_id = ?")
            .bind(tier.as_str())
            .bind(&user_id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn adjust_points(&self, user_id: &UserId, delta: i64) -> Result<i64, StoreError> {
        // One conditional UPDATE with a floor at zero. Two settlements
        // racing on the same balance both go through this statement, so
        // neither can observe a stale read and overdraw.
        let row = sqlx::query(
            "UPDATE user_profile
             SET points = MAX(points + ?, 0)
             WHERE user_id = ?
             RETURNING points",
        )
        .bind(delta)
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        match row {
            Some(row) => row.try_get("points").map_err(db_error),
            None => Err(StoreError::decode(format!("no profile row for user `{user_id}`"))),
        }
    }
}

fn profile_from_row(row: SqliteRow) -> Result<UserProfile, StoreError> {
    let tier_raw = row.try_get::<String, _>("tier").map_err(db_error)?;
    let tier = MembershipTier::parse(&tier_raw)
        .ok_or_else(|| StoreError::decode(format!("unknown membership tier `{tier_raw}`")))?;

    Ok(UserProfile {
        user_id: UserId(row.try_get("user_id").map_err(db_error)?),
        tier,
        points: row.try_get("points").map_err(db_error)?,
    })
}
