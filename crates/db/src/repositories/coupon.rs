use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use yesfree_core::domain::coupon::{
    AvailableCoupon, Coupon, CouponId, DiscountType, UserCoupon, UserCouponId,
};
use yesfree_core::domain::user::UserId;
use yesfree_core::stores::{CouponStore, StoreError};

use super::{db_error, parse_optional_timestamp, parse_timestamp};
use crate::DbPool;

pub struct SqlCouponStore {
    pool: DbPool,
}

impl SqlCouponStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const JOINED_COLUMNS: &str = "
    user_coupon.id AS user_coupon_id,
    user_coupon.coupon_id,
    user_coupon.user_id,
    user_coupon.is_used,
    user_coupon.claimed_at,
    user_coupon.used_at,
    coupon.code,
    coupon.title,
    coupon.discount_type,
    coupon.discount_value,
    coupon.min_order_amount,
    coupon.max_discount_amount,
    coupon.valid_until,
    coupon.active";

#[async_trait::async_trait]
impl CouponStore for SqlCouponStore {
    async fn save_coupon(&self, coupon: Coupon) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO coupon (
                id,
                code,
                title,
                discount_type,
                discount_value,
                min_order_amount,
                max_discount_amount,
                valid_until,
                active
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                code = excluded.code,
                title = excluded.title,
                discount_type = excluded.discount_type,
                discount_value = excluded.discount_value,
                min_order_amount = excluded.min_order_amount,
                max_discount_amount = excluded.max_discount_amount,
                valid_until = excluded.valid_until,
                active = excluded.active",
        )
        .bind(&coupon.id.0)
        .bind(&coupon.code)
        .bind(&coupon.title)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value)
        .bind(coupon.min_order_amount)
        .bind(coupon.max_discount_amount)
        .bind(coupon.valid_until.to_rfc3339())
        .bind(coupon.active)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError> {
        let row = sqlx::query(
            "SELECT
                id,
                code,
                title,
                discount_type,
                discount_value,
                min_order_amount,
                max_discount_amount,
                valid_until,
                active
             FROM coupon
             WHERE code = ? AND active = 1 AND valid_until >= ?",
        )
        .bind(code)
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(coupon_from_row).transpose()
    }

    async fn holds_unused(
        &self,
        user_id: &UserId,
        coupon_id: &CouponId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM user_coupon
             WHERE user_id = ? AND coupon_id = ? AND is_used = 0",
        )
        .bind(&user_id.0)
        .bind(&coupon_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        let count: i64 = row.try_get("count").map_err(db_error)?;

        Ok(count > 0)
    }

    async fn save_user_coupon(&self, user_coupon: UserCoupon) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO user_coupon (id, coupon_id, user_id, is_used, claimed_at, used_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user_coupon.id.0)
        .bind(&user_coupon.coupon_id.0)
        .bind(&user_coupon.user_id.0)
        .bind(user_coupon.is_used)
        .bind(user_coupon.claimed_at.to_rfc3339())
        .bind(user_coupon.used_at.map(|value| value.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn list_unused_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AvailableCoupon>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOINED_COLUMNS}
             FROM user_coupon
             JOIN coupon ON coupon.id = user_coupon.coupon_id
             WHERE user_coupon.user_id = ? AND user_coupon.is_used = 0
             ORDER BY user_coupon.claimed_at ASC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(available_from_row).collect()
    }

    async fn find_unused_for_user(
        &self,
        id: &UserCouponId,
        user_id: &UserId,
    ) -> Result<Option<AvailableCoupon>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {JOINED_COLUMNS}
             FROM user_coupon
             JOIN coupon ON coupon.id = user_coupon.coupon_id
             WHERE user_coupon.id = ? AND user_coupon.user_id = ? AND user_coupon.is_used = 0"
        ))
        .bind(&id.0)
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(available_from_row).transpose()
    }

    async fn mark_used(
        &self,
        id: &UserCouponId,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // The is_used predicate is the single-use guard: of two racing
        // settlements, only one sees rows_affected = 1.
        let result = sqlx::query(
            "UPDATE user_coupon SET is_used = 1, used_at = ? WHERE id = ? AND is_used = 0",
        )
        .bind(used_at.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }
}

fn coupon_from_row(row: SqliteRow) -> Result<Coupon, StoreError> {
    let discount_type_raw = row.try_get::<String, _>("discount_type").map_err(db_error)?;
    let discount_type = DiscountType::parse(&discount_type_raw)
        .ok_or_else(|| StoreError::decode(format!("unknown discount type `{discount_type_raw}`")))?;

    Ok(Coupon {
        id: CouponId(row.try_get("id").map_err(db_error)?),
        code: row.try_get("code").map_err(db_error)?,
        title: row.try_get("title").map_err(db_error)?,
        discount_type,
        discount_value: row.try_get("discount_value").map_err(db_error)?,
        min_order_amount: row.try_get("min_order_amount").map_err(db_error)?,
        max_discount_amount: row.try_get("max_discount_amount").map_err(db_error)?,
        valid_until: parse_timestamp("valid_until", row.try_get("valid_until").map_err(db_error)?)?,
        active: row.try_get("active").map_err(db_error)?,
    })
}

fn available_from_row(row: SqliteRow) -> Result<AvailableCoupon, StoreError> {
    let discount_type_raw = row.try_get::<String, _>("discount_type").map_err(db_error)?;
    let discount_type = DiscountType::parse(&discount_type_raw)
        .ok_or_else(|| StoreError::decode(format!("unknown discount type `{discount_type_raw}`")))?;

    let coupon_id = CouponId(row.try_get("coupon_id").map_err(db_error)?);

    Ok(AvailableCoupon {
        user_coupon: UserCoupon {
            id: UserCouponId(row.try_get("user_coupon_id").map_err(db_error)?),
            coupon_id: coupon_id.clone(),
            user_id: UserId(row.try_get("user_id").map_err(db_error)?),
            is_used: row.try_get("is_used").map_err(db_error)?,
            claimed_at: parse_timestamp(
                "claimed_at",
                row.try_get("claimed_at").map_err(db_error)?,
            )?,
            used_at: parse_optional_timestamp("used_at", row.try_get("used_at").map_err(db_error)?)?,
        },
        coupon: Coupon {
            id: coupon_id,
            code: row.try_get("code").map_err(db_error)?,
            title: row.try_get("title").map_err(db_error)?,
            discount_type,
            discount_value: row.try_get("discount_value").map_err(db_error)?,
            min_order_amount: row.try_get("min_order_amount").map_err(db_error)?,
            max_discount_amount: row.try_get("max_discount_amount").map_err(db_error)?,
            valid_until: parse_timestamp(
                "valid_until",
                row.try_get("valid_until").map_err(db_error)?,
            )?,
            active: row.try_get("active").map_err(db_error)?,
        },
    })
}
