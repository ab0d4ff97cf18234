//! In-memory store fakes for tests. They honor the same write semantics
//! as the sqlite stores: merged cart lines, the floor-at-zero points
//! write, and the conditional coupon burn.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use yesfree_core::domain::address::{AddressId, ShippingAddress};
use yesfree_core::domain::cart::{Cart, CartId, CartLine, CartLineId};
use yesfree_core::domain::coupon::{AvailableCoupon, Coupon, CouponId, UserCoupon, UserCouponId};
use yesfree_core::domain::order::{Order, OrderId, OrderItem, OrderNumber};
use yesfree_core::domain::product::{ProductId, ProductSummary};
use yesfree_core::domain::user::{MembershipTier, UserId, UserProfile};
use yesfree_core::stores::{
    AddressStore, CartStore, CouponStore, FulfillmentUpdate, OrderStore, ProfileStore, StoreError,
};

#[derive(Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<String, Cart>>>,
    lines: Arc<RwLock<HashMap<String, CartLine>>>,
    products: Arc<RwLock<HashMap<String, ProductSummary>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the catalog entry joined onto lines of this product.
    pub async fn put_product(&self, id: ProductId, summary: ProductSummary) {
        self.products.write().await.insert(id.0, summary);
    }

    pub async fn retire_product(&self, id: &ProductId) {
        self.products.write().await.remove(&id.0);
    }

    pub async fn line_count(&self, cart_id: &CartId) -> usize {
        self.lines.read().await.values().filter(|line| line.cart_id == *cart_id).count()
    }
}

#[async_trait::async_trait]
impl CartStore for InMemoryCartStore {
    async fn find_cart(&self, id: &CartId) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.read().await.get(&id.0).cloned())
    }

    async fn lines_for_cart(&self, id: &CartId) -> Result<Vec<CartLine>, StoreError> {
        let products = self.products.read().await;
        let mut lines: Vec<CartLine> = self
            .lines
            .read()
            .await
            .values()
            .filter(|line| line.cart_id == *id)
            .cloned()
            .map(|mut line| {
                line.product = products.get(&line.product_id.0).cloned();
                line
            })
            .collect();
        lines.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(lines)
    }

    async fn upsert_line(&self, line: CartLine) -> Result<CartLine, StoreError> {
        let mut lines = self.lines.write().await;
        let existing = lines
            .values()
            .find(|candidate| candidate.cart_id == line.cart_id && candidate.same_selection(&line))
            .cloned();

        let stored = match existing {
            Some(mut merged) => {
                merged.quantity = merged.quantity.saturating_add(line.quantity);
                lines.insert(merged.id.0.clone(), merged.clone());
                merged
            }
            None => {
                lines.insert(line.id.0.clone(), line.clone());
                line
            }
        };

        Ok(stored)
    }

    async fn delete_line(&self, id: &CartLineId) -> Result<(), StoreError> {
        self.lines.write().await.remove(&id.0);
        Ok(())
    }

    async fn save_cart(&self, cart: Cart) -> Result<(), StoreError> {
        self.carts.write().await.insert(cart.id.0.clone(), cart);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAddressStore {
    addresses: Arc<RwLock<HashMap<String, ShippingAddress>>>,
}

impl InMemoryAddressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AddressStore for InMemoryAddressStore {
    async fn find_for_user(
        &self,
        id: &AddressId,
        user_id: &UserId,
    ) -> Result<Option<ShippingAddress>, StoreError> {
        Ok(self
            .addresses
            .read()
            .await
            .get(&id.0)
            .filter(|address| address.user_id == *user_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<ShippingAddress>, StoreError> {
        let mut addresses: Vec<ShippingAddress> = self
            .addresses
            .read()
            .await
            .values()
            .filter(|address| address.user_id == *user_id)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default.cmp(&a.is_default).then(b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn save(&self, address: ShippingAddress) -> Result<(), StoreError> {
        let mut addresses = self.addresses.write().await;
        if address.is_default {
            for existing in addresses.values_mut() {
                if existing.user_id == address.user_id && existing.id != address.id {
                    existing.is_default = false;
                }
            }
        }
        addresses.insert(address.id.0.clone(), address);
        Ok(())
    }

    async fn set_default(&self, user_id: &UserId, id: &AddressId) -> Result<(), StoreError> {
        let mut addresses = self.addresses.write().await;
        for address in addresses.values_mut() {
            if address.user_id == *user_id {
                address.is_default = address.id == *id;
            }
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: Arc<RwLock<HashMap<String, UserProfile>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().await.get(&user_id.0).cloned())
    }

    async fn save(&self, profile: UserProfile) -> Result<(), StoreError> {
        self.profiles.write().await.insert(profile.user_id.0.clone(), profile);
        Ok(())
    }

    async fn set_tier(&self, user_id: &UserId, tier: MembershipTier) -> Result<(), StoreError> {
        if let Some(profile) = self.profiles.write().await.get_mut(&user_id.0) {
            profile.tier = tier;
        }
        Ok(())
    }

    async fn adjust_points(&self, user_id: &UserId, delta: i64) -> Result<i64, StoreError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(&user_id.0)
            .ok_or_else(|| StoreError::decode(format!("no profile row for user `{user_id}`")))?;
        profile.points = profile.points.saturating_add(delta).max(0);
        Ok(profile.points)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCouponStore {
    coupons: Arc<RwLock<HashMap<String, Coupon>>>,
    user_coupons: Arc<RwLock<HashMap<String, UserCoupon>>>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn save_coupon(&self, coupon: Coupon) -> Result<(), StoreError> {
        self.coupons.write().await.insert(coupon.id.0.clone(), coupon);
        Ok(())
    }

    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, StoreError> {
        Ok(self
            .coupons
            .read()
            .await
            .values()
            .find(|coupon| coupon.code == code && coupon.active && !coupon.is_expired(now))
            .cloned())
    }

    async fn holds_unused(
        &self,
        user_id: &UserId,
        coupon_id: &CouponId,
    ) -> Result<bool, StoreError> {
        Ok(self.user_coupons.read().await.values().any(|held| {
            held.user_id == *user_id && held.coupon_id == *coupon_id && !held.is_used
        }))
    }

    async fn save_user_coupon(&self, user_coupon: UserCoupon) -> Result<(), StoreError> {
        self.user_coupons.write().await.insert(user_coupon.id.0.clone(), user_coupon);
        Ok(())
    }

    async fn list_unused_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<AvailableCoupon>, StoreError> {
        let coupons = self.coupons.read().await;
        let mut held: Vec<AvailableCoupon> = self
            .user_coupons
            .read()
            .await
            .values()
            .filter(|held| held.user_id == *user_id && !held.is_used)
            .filter_map(|held| {
                coupons.get(&held.coupon_id.0).map(|coupon| AvailableCoupon {
                    user_coupon: held.clone(),
                    coupon: coupon.clone(),
                })
            })
            .collect();
        held.sort_by(|a, b| a.user_coupon.claimed_at.cmp(&b.user_coupon.claimed_at));
        Ok(held)
    }

    async fn find_unused_for_user(
        &self,
        id: &UserCouponId,
        user_id: &UserId,
    ) -> Result<Option<AvailableCoupon>, StoreError> {
        let coupons = self.coupons.read().await;
        Ok(self
            .user_coupons
            .read()
            .await
            .get(&id.0)
            .filter(|held| held.user_id == *user_id && !held.is_used)
            .and_then(|held| {
                coupons.get(&held.coupon_id.0).map(|coupon| AvailableCoupon {
                    user_coupon: held.clone(),
                    coupon: coupon.clone(),
                })
            }))
    }

    async fn mark_used(
        &self,
        id: &UserCouponId,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut user_coupons = self.user_coupons.write().await;
        match user_coupons.get_mut(&id.0) {
            Some(held) if !held.is_used => {
                held.is_used = true;
                held.used_at = Some(used_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
    items: Arc<RwLock<HashMap<String, OrderItem>>>,
    fail_inserts: Arc<RwLock<bool>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, `insert_order` fails with a backend error. Used to
    /// exercise settlement's error paths.
    pub async fn set_fail_inserts(&self, fail: bool) {
        *self.fail_inserts.write().await = fail;
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        if *self.fail_inserts.read().await {
            return Err(StoreError::backend("injected insert failure"));
        }

        let mut orders = self.orders.write().await;
        if orders.values().any(|existing| existing.order_number == order.order_number) {
            return Err(StoreError::backend(format!(
                "UNIQUE constraint failed: orders.order_number ({})",
                order.order_number
            )));
        }
        orders.insert(order.id.0.clone(), order.clone());
        Ok(())
    }

    async fn insert_items(&self, items: &[OrderItem]) -> Result<(), StoreError> {
        let mut stored = self.items.write().await;
        for item in items {
            stored.insert(item.id.clone(), item.clone());
        }
        Ok(())
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|order| order.order_number == *number)
            .cloned())
    }

    async fn items_for_order(&self, id: &OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let mut items: Vec<OrderItem> = self
            .items
            .read()
            .await
            .values()
            .filter(|item| item.order_id == *id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|order| order.user_id == *user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn monthly_spend(
        &self,
        user_id: &UserId,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|order| {
                order.user_id == *user_id
                    && order.created_at >= since
                    && order.status.counts_toward_spend()
            })
            .map(|order| order.total_amount)
            .sum())
    }

    async fn set_earned_points(&self, id: &OrderId, points: i64) -> Result<(), StoreError> {
        if let Some(order) = self.orders.write().await.get_mut(&id.0) {
            order.earned_points = points;
        }
        Ok(())
    }

    async fn update_fulfillment(
        &self,
        number: &OrderNumber,
        update: FulfillmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Order>, StoreError> {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.values_mut().find(|order| order.order_number == *number) else {
            return Ok(None);
        };

        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(courier) = update.courier {
            order.courier = Some(courier);
        }
        if let Some(tracking_number) = update.tracking_number {
            order.tracking_number = Some(tracking_number);
        }
        if let Some(admin_memo) = update.admin_memo {
            order.admin_memo = Some(admin_memo);
        }
        order.updated_at = now;

        Ok(Some(order.clone()))
    }
}
