//! Order settlement: turns a cart (or a subset of its lines) into a
//! persisted order with immutable line snapshots, debits redeemed
//! points, consumes the applied coupon, and triggers the loyalty award.
//!
//! Step ordering is a correctness requirement. Validation happens before
//! any write; order/items/cart-cleanup failures propagate with whatever
//! partial state exists (there is no compensating rollback); the
//! points-debit, coupon-consume, and points-award tail is best-effort
//! and can never invalidate an already-persisted order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::coupons::CouponLedger;
use crate::domain::address::AddressId;
use crate::domain::cart::{CartId, CartLine, CartLineId};
use crate::domain::coupon::UserCouponId;
use crate::domain::order::{
    Order, OrderId, OrderItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
};
use crate::domain::user::UserId;
use crate::errors::SettlementError;
use crate::loyalty::LoyaltyLedger;
use crate::pricing::{clamp_used_points, discount_for, shipping_fee_for};
use crate::stores::{AddressStore, CartStore, CouponStore, OrderStore, ProfileStore};

#[derive(Clone, Debug)]
pub struct SettlementRequest {
    pub user_id: UserId,
    pub shipping_address_id: AddressId,
    pub cart_id: CartId,
    /// When present, only these cart lines are ordered; the rest stay in
    /// the cart. When absent the whole cart is settled.
    pub cart_line_ids: Option<Vec<CartLineId>>,
    pub user_coupon_id: Option<UserCouponId>,
    /// Client-requested redemption. Clamped, never rejected.
    pub used_points: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Clone, Debug)]
pub struct SettlementConfig {
    /// Attempts at generating an unused order number before giving up.
    pub order_number_attempts: u32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { order_number_attempts: 5 }
    }
}

/// Intermediate monetary figures for one settlement. Pure, so the clamp
/// and floor rules are testable without stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount_amount: i64,
    pub amount_after_discount: i64,
    pub used_points: i64,
    pub total_amount: i64,
}

impl Totals {
    pub fn compute(
        subtotal: i64,
        shipping_fee: i64,
        discount_amount: i64,
        requested_points: i64,
        points_balance: i64,
    ) -> Self {
        let amount_after_discount = (subtotal + shipping_fee - discount_amount).max(0);
        let used_points = clamp_used_points(requested_points, points_balance, amount_after_discount);
        let total_amount = (amount_after_discount - used_points).max(0);
        Self {
            subtotal,
            shipping_fee,
            discount_amount,
            amount_after_discount,
            used_points,
            total_amount,
        }
    }
}

pub struct SettlementService {
    carts: Arc<dyn CartStore>,
    addresses: Arc<dyn AddressStore>,
    profiles: Arc<dyn ProfileStore>,
    coupons: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderStore>,
    coupon_ledger: CouponLedger,
    loyalty: LoyaltyLedger,
    config: SettlementConfig,
}

impl SettlementService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        addresses: Arc<dyn AddressStore>,
        profiles: Arc<dyn ProfileStore>,
        coupons: Arc<dyn CouponStore>,
        orders: Arc<dyn OrderStore>,
    ) -> Self {
        Self::with_config(carts, addresses, profiles, coupons, orders, SettlementConfig::default())
    }

    pub fn with_config(
        carts: Arc<dyn CartStore>,
        addresses: Arc<dyn AddressStore>,
        profiles: Arc<dyn ProfileStore>,
        coupons: Arc<dyn CouponStore>,
        orders: Arc<dyn OrderStore>,
        config: SettlementConfig,
    ) -> Self {
        let coupon_ledger = CouponLedger::new(coupons.clone());
        let loyalty = LoyaltyLedger::new(profiles.clone(), orders.clone());
        Self { carts, addresses, profiles, coupons, orders, coupon_ledger, loyalty, config }
    }

    pub async fn settle(&self, request: SettlementRequest) -> Result<Order, SettlementError> {
        let now = Utc::now();

        // Steps 1-2: resolve ownership-scoped address and cart.
        let address = self
            .addresses
            .find_for_user(&request.shipping_address_id, &request.user_id)
            .await?
            .ok_or(SettlementError::AddressNotFound)?;

        let cart = self
            .carts
            .find_cart(&request.cart_id)
            .await?
            .filter(|cart| cart.user_id == request.user_id)
            .ok_or(SettlementError::CartNotFound)?;

        // Step 3: select order lines. Lines whose product join failed are
        // dropped before pricing rather than crashing the computation.
        let lines = self.carts.lines_for_cart(&cart.id).await?;
        let selected: Vec<CartLine> = match &request.cart_line_ids {
            Some(ids) => lines
                .into_iter()
                .filter(|line| ids.contains(&line.id) && line.product.is_some())
                .collect(),
            None => lines.into_iter().filter(|line| line.product.is_some()).collect(),
        };
        if selected.is_empty() {
            return Err(SettlementError::EmptyOrder);
        }

        // Step 4: current tier and points balance.
        let profile = self
            .profiles
            .find(&request.user_id)
            .await?
            .ok_or(SettlementError::ProfileNotFound)?;

        // Steps 5-6.
        let shipping_fee = shipping_fee_for(profile.tier);
        let subtotal: i64 = selected.iter().map(CartLine::line_subtotal).sum();

        // Step 7: the selected coupon must be an unused holding of this
        // user; expired or below-minimum selections simply discount zero.
        let mut applied_coupon = None;
        let discount_amount = match &request.user_coupon_id {
            Some(user_coupon_id) => {
                let held = self
                    .coupons
                    .find_unused_for_user(user_coupon_id, &request.user_id)
                    .await?
                    .ok_or(SettlementError::CouponNotAvailable)?;
                let discount = discount_for(&held.coupon, subtotal + shipping_fee, now);
                applied_coupon = Some(held);
                discount
            }
            None => 0,
        };

        // Steps 8-10.
        let totals = Totals::compute(
            subtotal,
            shipping_fee,
            discount_amount,
            request.used_points,
            profile.points,
        );

        // Steps 11-12: shipping snapshot and unique order number.
        let order_number = self.unique_order_number(now).await?;

        let order = Order {
            id: OrderId(Uuid::new_v4().to_string()),
            order_number,
            user_id: request.user_id.clone(),
            status: OrderStatus::PaymentPending,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            discount_amount: totals.discount_amount,
            used_points: totals.used_points,
            total_amount: totals.total_amount,
            earned_points: 0,
            recipient: address.recipient.clone(),
            recipient_phone: address.phone.clone(),
            shipping_address: address.formatted(),
            shipping_memo: address.memo.clone(),
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Pending,
            courier: None,
            tracking_number: None,
            admin_memo: None,
            created_at: now,
            updated_at: now,
        };

        // Steps 13-14: persist the order and its line snapshots. From
        // here on failures propagate with partial state left as-is.
        self.orders.insert_order(&order).await?;

        let items: Vec<OrderItem> =
            selected.iter().filter_map(|line| order_item_from_line(&order.id, line)).collect();
        self.orders.insert_items(&items).await?;

        // Step 15: clear only the consumed cart lines.
        for line in &selected {
            self.carts.delete_line(&line.id).await?;
        }

        // Steps 16-18 are best-effort bookkeeping. The order is already
        // financially committed; none of these may undo it.
        let mut order = order;

        if totals.used_points > 0 {
            if let Err(error) = self.profiles.adjust_points(&order.user_id, -totals.used_points).await {
                tracing::warn!(
                    event_name = "checkout.settlement.points_debit_failed",
                    user_id = %order.user_id,
                    order_number = %order.order_number,
                    used_points = totals.used_points,
                    error = %error,
                    "points debit failed after order persistence"
                );
            }
        }

        if let Some(held) = &applied_coupon {
            if totals.discount_amount > 0 {
                match self.coupon_ledger.mark_used(&held.user_coupon.id, now).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(
                            event_name = "checkout.settlement.coupon_already_used",
                            user_id = %order.user_id,
                            order_number = %order.order_number,
                            user_coupon_id = %held.user_coupon.id,
                            "coupon was consumed concurrently; order keeps its discount"
                        );
                    }
                    Err(error) => {
                        tracing::warn!(
                            event_name = "checkout.settlement.coupon_mark_failed",
                            user_id = %order.user_id,
                            order_number = %order.order_number,
                            user_coupon_id = %held.user_coupon.id,
                            error = %error,
                            "failed to mark coupon used after order persistence"
                        );
                    }
                }
            }
        }

        match self.loyalty.award_points(&order.user_id, &order.id, order.total_amount, now).await {
            Ok(earned) => order.earned_points = earned,
            Err(error) => {
                tracing::warn!(
                    event_name = "checkout.settlement.points_award_failed",
                    user_id = %order.user_id,
                    order_number = %order.order_number,
                    total_amount = order.total_amount,
                    error = %error,
                    "points award failed after order persistence"
                );
            }
        }

        tracing::info!(
            event_name = "checkout.settlement.completed",
            user_id = %order.user_id,
            order_number = %order.order_number,
            subtotal = order.subtotal,
            discount_amount = order.discount_amount,
            used_points = order.used_points,
            total_amount = order.total_amount,
            earned_points = order.earned_points,
            "order settled"
        );

        Ok(order)
    }

    /// Date-prefixed random order numbers can collide; retry a bounded
    /// number of times before failing the settlement.
    async fn unique_order_number(
        &self,
        now: DateTime<Utc>,
    ) -> Result<OrderNumber, SettlementError> {
        for _ in 0..self.config.order_number_attempts.max(1) {
            let candidate = OrderNumber::generate(now, &mut rand::thread_rng());
            if self.orders.find_by_number(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(SettlementError::OrderNumberExhausted)
    }
}

fn order_item_from_line(order_id: &OrderId, line: &CartLine) -> Option<OrderItem> {
    let product = line.product.as_ref()?;
    Some(OrderItem {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.clone(),
        product_id: line.product_id.clone(),
        product_name: product.name.clone(),
        brand: product.brand.clone(),
        image_url: product.image_url.clone(),
        unit_price: line.unit_price,
        quantity: line.quantity,
        line_subtotal: line.line_subtotal(),
    })
}
