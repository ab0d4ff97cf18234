//! Async store contracts for every external collaborator the checkout
//! core touches. Implementations are injected at construction so the
//! settlement engine can run against the sqlite stores in production and
//! in-memory fakes in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::address::{AddressId, ShippingAddress};
use crate::domain::cart::{Cart, CartId, CartLine, CartLineId};
use crate::domain::coupon::{AvailableCoupon, Coupon, UserCoupon, UserCouponId};
use crate::domain::order::{Order, OrderId, OrderItem, OrderNumber, OrderStatus};
use crate::domain::user::{MembershipTier, UserId, UserProfile};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store decode error: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn backend(source: impl std::fmt::Display) -> Self {
        Self::Backend(source.to_string())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_cart(&self, id: &CartId) -> Result<Option<Cart>, StoreError>;

    /// Lines with their live product join; a line whose product has been
    /// retired comes back with `product = None`.
    async fn lines_for_cart(&self, id: &CartId) -> Result<Vec<CartLine>, StoreError>;

    /// Insert the line, or increment quantity when the cart already
    /// holds the same (product, option-set) selection. Returns the
    /// stored line.
    async fn upsert_line(&self, line: CartLine) -> Result<CartLine, StoreError>;

    async fn delete_line(&self, id: &CartLineId) -> Result<(), StoreError>;

    async fn save_cart(&self, cart: Cart) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Scoped lookup: returns None when the address does not exist or
    /// belongs to a different user.
    async fn find_for_user(
        &self,
        id: &AddressId,
        user_id: &UserId,
    ) -> Result<Option<ShippingAddress>, StoreError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ShippingAddress>, StoreError>;

    /// Upserts the address. Saving one with `is_default` set demotes the
    /// user's other addresses.
    async fn save(&self, address: ShippingAddress) -> Result<(), StoreError>;

    /// Makes `id` the user's default and clears the previous default in
    /// the same operation.
    async fn set_default(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, StoreError>;

    async fn save(&self, profile: UserProfile) -> Result<(), StoreError>;

    async fn set_tier(&self, user_id: &UserId, tier: MembershipTier) -> Result<(), StoreError>;

    /// Atomically applies `delta` to the points balance, flooring at
    /// zero. Returns the new balance. A single conditional write, not
    /// read-modify-write, so concurrent settlements cannot drive the
    /// balance negative.
    async fn adjust_points(&self, user_id: &UserId, delta: i64) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn save_coupon(&self, coupon: Coupon) -> Result<(), StoreError>;

    /// Lookup by already-normalized code; only active, unexpired coupons
    /// are returned.
    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError>;

    /// Whether the user currently holds an unused instance of the coupon.
    async fn holds_unused(&self, user_id: &UserId, coupon_id: &crate::domain::coupon::CouponId)
        -> Result<bool, StoreError>;

    async fn save_user_coupon(&self, user_coupon: UserCoupon) -> Result<(), StoreError>;

    async fn list_unused_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AvailableCoupon>, StoreError>;

    async fn find_unused_for_user(
        &self,
        id: &UserCouponId,
        user_id: &UserId,
    ) -> Result<Option<AvailableCoupon>, StoreError>;

    /// Flips the user coupon to used, once. Returns false when it was
    /// already consumed (the conditional write is the single-use guard).
    async fn mark_used(
        &self,
        id: &UserCouponId,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FulfillmentUpdate {
    pub status: Option<OrderStatus>,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub admin_memo: Option<String>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn insert_items(&self, items: &[OrderItem]) -> Result<(), StoreError>;

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError>;

    async fn items_for_order(&self, id: &OrderId) -> Result<Vec<OrderItem>, StoreError>;

    /// Newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;

    /// Sum of `total_amount` over the user's orders created at or after
    /// `since`, excluding cancelled/returned statuses.
    async fn monthly_spend(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    async fn set_earned_points(&self, id: &OrderId, points: i64) -> Result<(), StoreError>;

    /// Admin-only write path for fulfillment fields. Returns the updated
    /// order, or None when the order number is unknown.
    async fn update_fulfillment(
        &self,
        number: &OrderNumber,
        update: FulfillmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError>;
}
