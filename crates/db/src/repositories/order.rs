use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use yesfree_core::domain::order::{
    Order, OrderId, OrderItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
};
use yesfree_core::domain::product::ProductId;
use yesfree_core::domain::user::UserId;
use yesfree_core::stores::{FulfillmentUpdate, OrderStore, StoreError};

use super::{db_error, parse_timestamp, parse_u32};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "
    id,
    order_number,
    user_id,
    status,
    subtotal,
    shipping_fee,
    discount_amount,
    used_points,
    total_amount,
    earned_points,
    recipient,
    recipient_phone,
    shipping_address,
    shipping_memo,
    payment_method,
    payment_status,
    courier,
    tracking_number,
    admin_memo,
    created_at,
    updated_at";

#[async_trait::async_trait]
impl OrderStore for SqlOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        // Plain INSERT: the UNIQUE constraint on order_number is what
        // surfaces number collisions to the retry loop.
        sqlx::query(
            "INSERT INTO orders (
                id,
                order_number,
                user_id,
                status,
                subtotal,
                shipping_fee,
                discount_amount,
                used_points,
                total_amount,
                earned_points,
                recipient,
                recipient_phone,
                shipping_address,
                shipping_memo,
                payment_method,
                payment_status,
                courier,
                tracking_number,
                admin_memo,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number.0)
        .bind(&order.user_id.0)
        .bind(order.status.as_str())
        .bind(order.subtotal)
        .bind(order.shipping_fee)
        .bind(order.discount_amount)
        .bind(order.used_points)
        .bind(order.total_amount)
        .bind(order.earned_points)
        .bind(&order.recipient)
        .bind(&order.recipient_phone)
        .bind(&order.shipping_address)
        .bind(order.shipping_memo.as_deref())
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.courier.as_deref())
        .bind(order.tracking_number.as_deref())
        .bind(order.admin_memo.as_deref())
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn insert_items(&self, items: &[OrderItem]) -> Result<(), StoreError> {
        for item in items {
            sqlx::query(
                "INSERT INTO order_item (
                    id,
                    order_id,
                    product_id,
                    product_name,
                    brand,
                    image_url,
                    unit_price,
                    quantity,
                    line_subtotal
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(&item.order_id.0)
            .bind(&item.product_id.0)
            .bind(&item.product_name)
            .bind(&item.brand)
            .bind(item.image_url.as_deref())
            .bind(item.unit_price)
            .bind(i64::from(item.quantity))
            .bind(item.line_subtotal)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        }

        Ok(())
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        let row =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = ?"))
                .bind(&number.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;

        row.map(order_from_row).transpose()
    }

    async fn items_for_order(&self, id: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT
                id,
                order_id,
                product_id,
                product_name,
                brand,
                image_url,
                unit_price,
                quantity,
                line_subtotal
             FROM order_item
             WHERE order_id = ?
             ORDER BY id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(item_from_row).collect()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE user_id = ?
             ORDER BY created_at DESC"
        ))
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(order_from_row).collect()
    }

    async fn monthly_spend(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query(
            "SELECT IFNULL(SUM(total_amount), 0) AS spend
             FROM orders
             WHERE user_id = ?
               AND created_at >= ?
               AND status NOT IN ('cancel_requested', 'return_requested')",
        )
        .bind(&user_id.0)
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        row.try_get("spend").map_err(db_error)
    }

    async fn set_earned_points(&self, id: &OrderId, points: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE orders SET earned_points = ? WHERE id = ?")
            .bind(points)
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn update_fulfillment(
        &self,
        number: &OrderNumber,
        update: FulfillmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        // COALESCE keeps fields the caller omitted; monetary columns are
        // never touched here.
        let row = sqlx::query(&format!(
            "UPDATE orders SET
                status = COALESCE(?, status),
                courier = COALESCE(?, courier),
                tracking_number = COALESCE(?, tracking_number),
                admin_memo = COALESCE(?, admin_memo),
                updated_at = ?
             WHERE order_number = ?
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(update.status.map(|status| status.as_str()))
        .bind(update.courier.as_deref())
        .bind(update.tracking_number.as_deref())
        .bind(update.admin_memo.as_deref())
        .bind(now.to_rfc3339())
        .bind(&number.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(order_from_row).transpose()
    }
}

fn order_from_row(row: SqliteRow) -> Result<Order, StoreError> {
    let status_raw = row.try_get::<String, _>("status").map_err(db_error)?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::decode(format!("unknown order status `{status_raw}`")))?;

    let payment_method_raw = row.try_get::<String, _>("payment_method").map_err(db_error)?;
    let payment_method = PaymentMethod::parse(&payment_method_raw).ok_or_else(|| {
        StoreError::decode(format!("unknown payment method `{payment_method_raw}`"))
    })?;

    let payment_status_raw = row.try_get::<String, _>("payment_status").map_err(db_error)?;
    let payment_status = PaymentStatus::parse(&payment_status_raw).ok_or_else(|| {
        StoreError::decode(format!("unknown payment status `{payment_status_raw}`"))
    })?;

    Ok(Order {
        id: OrderId(row.try_get("id").map_err(db_error)?),
        order_number: OrderNumber(row.try_get("order_number").map_err(db_error)?),
        user_id: UserId(row.try_get("user_id").map_err(db_error)?),
        status,
        subtotal: row.try_get("subtotal").map_err(db_error)?,
        shipping_fee: row.try_get("shipping_fee").map_err(db_error)?,
        discount_amount: row.try_get("discount_amount").map_err(db_error)?,
        used_points: row.try_get("used_points").map_err(db_error)?,
        total_amount: row.try_get("total_amount").map_err(db_error)?,
        earned_points: row.try_get("earned_points").map_err(db_error)?,
        recipient: row.try_get("recipient").map_err(db_error)?,
        recipient_phone: row.try_get("recipient_phone").map_err(db_error)?,
        shipping_address: row.try_get("shipping_address").map_err(db_error)?,
        shipping_memo: row.try_get("shipping_memo").map_err(db_error)?,
        payment_method,
        payment_status,
        courier: row.try_get("courier").map_err(db_error)?,
        tracking_number: row.try_get("tracking_number").map_err(db_error)?,
        admin_memo: row.try_get("admin_memo").map_err(db_error)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at").map_err(db_error)?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at").map_err(db_error)?)?,
    })
}

fn item_from_row(row: SqliteRow) -> Result<OrderItem, StoreError> {
    Ok(OrderItem {
        id: row.try_get("id").map_err(db_error)?,
        order_id: OrderId(row.try_get("order_id").map_err(db_error)?),
        product_id: ProductId(row.try_get("product_id").map_err(db_error)?),
        product_name: row.try_get("product_name").map_err(db_error)?,
        brand: row.try_get("brand").map_err(db_error)?,
        image_url: row.try_get("image_url").map_err(db_error)?,
        unit_price: row.try_get("unit_price").map_err(db_error)?,
        quantity: parse_u32("quantity", row.try_get("quantity").map_err(db_error)?)?,
        line_subtotal: row.try_get("line_subtotal").map_err(db_error)?,
    })
}
