use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::{ProductId, ProductSummary};
use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartLineId(pub String);

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// One cart entry. `unit_price` is the price snapshot captured when the
/// product entered the cart; later catalog price changes do not move it.
/// `product` is the live catalog join and may be absent when the product
/// has been retired since the line was added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: i64,
    pub selected_options: BTreeMap<String, String>,
    pub product: Option<ProductSummary>,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    pub fn new(
        cart_id: CartId,
        product_id: ProductId,
        quantity: u32,
        unit_price: i64,
        selected_options: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CartLineId(Uuid::new_v4().to_string()),
            cart_id,
            product_id,
            quantity: quantity.max(1),
            unit_price,
            selected_options,
            product: None,
            created_at: now,
        }
    }

    pub fn line_subtotal(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }

    /// Two lines are the same selection when product and option set
    /// match. At most one line per selection may exist in a cart; adding
    /// the same selection again increments quantity instead.
    pub fn same_selection(&self, other: &CartLine) -> bool {
        self.product_id == other.product_id && self.selected_options == other.selected_options
    }

    /// Canonical option-set encoding used for the uniqueness constraint.
    /// BTreeMap keeps key order stable, so equal selections always encode
    /// to the same string.
    pub fn options_key(&self) -> String {
        serde_json::to_string(&self.selected_options).unwrap_or_else(|_| "{}".to_string())
    }
}
