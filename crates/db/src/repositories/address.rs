use sqlx::{sqlite::SqliteRow, Row};

use yesfree_core::domain::address::{AddressId, ShippingAddress};
use yesfree_core::domain::user::UserId;
use yesfree_core::stores::{AddressStore, StoreError};

use super::{db_error, parse_timestamp};
use crate::DbPool;

pub struct SqlAddressStore {
    pool: DbPool,
}

impl SqlAddressStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, country, recipient, phone, line1, line2, memo, is_default, created_at";

#[async_trait::async_trait]
impl AddressStore for SqlAddressStore {
    async fn find_for_user(
        &self,
        id: &AddressId,
        user_id: &UserId,
    ) -> Result<Option<ShippingAddress>, StoreError> {
        // Ownership lives in the WHERE clause: another user's address id
        // resolves to nothing rather than to their address.
        let row = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shipping_address WHERE id = ? AND user_id = ?"
        ))
        .bind(&id.0)
        .bind(&user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(address_from_row).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ShippingAddress>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shipping_address
             WHERE user_id = ?
             ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(address_from_row).collect()
    }

    async fn save(&self, address: ShippingAddress) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            "INSERT INTO shipping_address (
                id, user_id, country, recipient, phone, line1, line2, memo, is_default, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                country = excluded.country,
                recipient = excluded.recipient,
                phone = excluded.phone,
                line1 = excluded.line1,
                line2 = excluded.line2,
                memo = excluded.memo,
                is_default = excluded.is_default",
        )
        .bind(&address.id.0)
        .bind(&address.user_id.0)
        .bind(&address.country)
        .bind(&address.recipient)
        .bind(&address.phone)
        .bind(&address.line1)
        .bind(address.line2.as_deref())
        .bind(address.memo.as_deref())
        .bind(address.is_default)
        .bind(address.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        // Saving a default demotes the user's other addresses in the same
        // transaction, so a user never ends up with two defaults.
        if address.is_default {
            sqlx::query(
                "UPDATE shipping_address SET is_default = 0 WHERE user_id = ? AND id != ?",
            )
            .bind(&address.user_id.0)
            .bind(&address.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    async fn set_default(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError> {
        // One statement: the CASE flips the chosen row on and every other
        // row for the user off, so there is never a moment with two
        // defaults.
        sqlx::query(
            "UPDATE shipping_address
             SET is_default = CASE WHEN id = ? THEN 1 ELSE 0 END
             WHERE user_id = ?",
        )
        .bind(&id.0)
        .bind(&user_id.0)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn address_from_row(row: SqliteRow) -> Result<ShippingAddress, StoreError> {
    Ok(ShippingAddress {
        id: AddressId(row.try_get("id").map_err(db_error)?),
        user_id: UserId(row.try_get("user_id").map_err(db_error)?),
        country: row.try_get("country").map_err(db_error)?,
        recipient: row.try_get("recipient").map_err(db_error)?,
        phone: row.try_get("phone").map_err(db_error)?,
        line1: row.try_get("line1").map_err(db_error)?,
        line2: row.try_get("line2").map_err(db_error)?,
        memo: row.try_get("memo").map_err(db_error)?,
        is_default: row.try_get("is_default").map_err(db_error)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at").map_err(db_error)?)?,
    })
}
