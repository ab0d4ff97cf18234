use std::collections::BTreeMap;

use sqlx::{sqlite::SqliteRow, Row};

use yesfree_core::domain::cart::{Cart, CartId, CartLine, CartLineId};
use yesfree_core::domain::product::{ProductId, ProductSummary};
use yesfree_core::domain::user::UserId;
use yesfree_core::stores::{CartStore, StoreError};

use super::{db_error, parse_timestamp, parse_u32};
use crate::DbPool;

pub struct SqlCartStore {
    pool: DbPool,
}

impl SqlCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CartStore for SqlCartStore {
    async fn find_cart(&self, id: &CartId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query("SELECT id, user_id, created_at FROM cart WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(cart_from_row).transpose()
    }

    async fn lines_for_cart(&self, id: &CartId) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                cart_line.id,
                cart_line.cart_id,
                cart_line.product_id,
                cart_line.quantity,
                cart_line.unit_price,
                cart_line.selected_options,
                cart_line.created_at,
                product.name AS product_name,
                product.brand AS product_brand,
                product.image_url AS product_image_url,
                product.price AS product_price
             FROM cart_line
             LEFT JOIN product ON product.id = cart_line.product_id
             WHERE cart_line.cart_id = ?
             ORDER BY cart_line.created_at ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(line_from_row).collect()
    }

    async fn upsert_line(&self, line: CartLine) -> Result<CartLine, StoreError> {
        // Same (cart, product, option-set) selection merges into the
        // existing row instead of duplicating it.
        sqlx::query(
            "INSERT INTO cart_line (
                id,
                cart_id,
                product_id,
                quantity,
                unit_price,
                selected_options,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(cart_id, product_id, selected_options) DO UPDATE SET
                quantity = cart_line.quantity + excluded.quantity",
        )
        .bind(&line.id.0)
        .bind(&line.cart_id.0)
        .bind(&line.product_id.0)
        .bind(i64::from(line.quantity))
        .bind(line.unit_price)
        .bind(line.options_key())
        .bind(line.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let row = sqlx::query(
            "SELECT
                cart_line.id,
                cart_line.cart_id,
                cart_line.product_id,
                cart_line.quantity,
                cart_line.unit_price,
                cart_line.selected_options,
                cart_line.created_at,
                product.name AS product_name,
                product.brand AS product_brand,
                product.image_url AS product_image_url,
                product.price AS product_price
             FROM cart_line
             LEFT JOIN product ON product.id = cart_line.product_id
             WHERE cart_line.cart_id = ?
               AND cart_line.product_id = ?
               AND cart_line.selected_options = ?",
        )
        .bind(&line.cart_id.0)
        .bind(&line.product_id.0)
        .bind(line.options_key())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        line_from_row(row)
    }

    async fn delete_line(&self, id: &CartLineId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_line WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn save_cart(&self, cart: Cart) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO cart (id, user_id, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id",
        )
        .bind(&cart.id.0)
        .bind(&cart.user_id.0)
        .bind(cart.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

fn cart_from_row(row: SqliteRow) -> Result<Cart, StoreError> {
    Ok(Cart {
        id: CartId(row.try_get("id").map_err(db_error)?),
        user_id: UserId(row.try_get("user_id").map_err(db_error)?),
        created_at: parse_timestamp("created_at", row.try_get("created_at").map_err(db_error)?)?,
    })
}

fn line_from_row(row: SqliteRow) -> Result<CartLine, StoreError> {
    let options_raw = row.try_get::<String, _>("selected_options").map_err(db_error)?;
    let selected_options: BTreeMap<String, String> = serde_json::from_str(&options_raw)
        .map_err(|error| {
            StoreError::decode(format!("invalid selected_options `{options_raw}`: {error}"))
        })?;

    let product = match row.try_get::<Option<String>, _>("product_name").map_err(db_error)? {
        Some(name) => Some(ProductSummary {
            name,
            brand: row.try_get("product_brand").map_err(db_error)?,
            image_url: row.try_get("product_image_url").map_err(db_error)?,
            price: row.try_get("product_price").map_err(db_error)?,
        }),
        None => None,
    };

    Ok(CartLine {
        id: CartLineId(row.try_get("id").map_err(db_error)?),
        cart_id: CartId(row.try_get("cart_id").map_err(db_error)?),
        product_id: ProductId(row.try_get("product_id").map_err(db_error)?),
        quantity: parse_u32("quantity", row.try_get("quantity").map_err(db_error)?)?,
        unit_price: row.try_get("unit_price").map_err(db_error)?,
        selected_options,
        product,
        created_at: parse_timestamp("created_at", row.try_get("created_at").map_err(db_error)?)?,
    })
}
