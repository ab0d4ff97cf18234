//! Pure pricing policy: shipping fee, points-earn rate, coupon
//! discounts, and membership tier classification. All amounts are minor
//! currency units; percent math floors, never rounds up.

use chrono::{DateTime, Utc};

use crate::domain::coupon::{Coupon, DiscountType};
use crate::domain::user::MembershipTier;

/// Flat fee charged to basic members. Premium and VIP ship free.
pub const BASIC_SHIPPING_FEE: i64 = 3_000;

/// Monthly-spend thresholds for tier classification.
pub const PREMIUM_THRESHOLD: i64 = 200_000;
pub const VIP_THRESHOLD: i64 = 500_000;

pub fn shipping_fee_for(tier: MembershipTier) -> i64 {
    match tier {
        MembershipTier::Basic => BASIC_SHIPPING_FEE,
        MembershipTier::Premium | MembershipTier::Vip => 0,
    }
}

pub fn points_rate_percent(tier: MembershipTier) -> i64 {
    match tier {
        MembershipTier::Basic => 1,
        MembershipTier::Premium => 2,
        MembershipTier::Vip => 3,
    }
}

/// Discount granted by `coupon` against `order_amount`. Always in
/// `0..=order_amount`: expired or below-minimum coupons discount
/// nothing, fixed discounts never exceed the order, percent discounts
/// floor and then respect the optional cap.
pub fn discount_for(coupon: &Coupon, order_amount: i64, now: DateTime<Utc>) -> i64 {
    if order_amount <= 0 || coupon.is_expired(now) || !coupon.meets_minimum(order_amount) {
        return 0;
    }

    match coupon.discount_type {
        DiscountType::Fixed => coupon.discount_value.clamp(0, order_amount),
        DiscountType::Percent => {
            let raw = order_amount.saturating_mul(coupon.discount_value.max(0)) / 100;
            let capped = match coupon.max_discount_amount {
                Some(cap) => raw.min(cap.max(0)),
                None => raw,
            };
            capped.clamp(0, order_amount)
        }
    }
}

/// Tier is always recomputed from scratch, so it can move down as well
/// as up.
pub fn classify_tier(monthly_spend: i64) -> MembershipTier {
    if monthly_spend >= VIP_THRESHOLD {
        MembershipTier::Vip
    } else if monthly_spend >= PREMIUM_THRESHOLD {
        MembershipTier::Premium
    } else {
        MembershipTier::Basic
    }
}

/// Points earned on a settled order: floor of the paid total times the
/// tier's earn rate.
pub fn earned_points_for(total_amount: i64, tier: MembershipTier) -> i64 {
    total_amount.max(0).saturating_mul(points_rate_percent(tier)) / 100
}

/// Authoritative clamp for a client-requested redemption. Out-of-range
/// requests are truncated, not rejected: points can never exceed the
/// balance nor push the order negative.
pub fn clamp_used_points(requested: i64, balance: i64, amount_after_discount: i64) -> i64 {
    requested.max(0).min(balance.max(0)).min(amount_after_discount.max(0))
}
