use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserCouponId(pub String);

impl std::fmt::Display for UserCouponId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percent,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Percent => "percent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(Self::Fixed),
            "percent" => Some(Self::Percent),
            _ => None,
        }
    }
}

/// A reusable discount definition. Immutable once any user holds it.
/// `max_discount_amount` only applies to percent coupons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub title: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_order_amount: Option<i64>,
    pub max_discount_amount: Option<i64>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
}

impl Coupon {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.valid_until
    }

    pub fn meets_minimum(&self, order_amount: i64) -> bool {
        self.min_order_amount.map_or(true, |minimum| order_amount >= minimum)
    }
}

/// One user's claimed, single-use instance of a coupon. Flips to used
/// exactly once at settlement and never back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCoupon {
    pub id: UserCouponId,
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub is_used: bool,
    pub claimed_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl UserCoupon {
    pub fn issue(coupon_id: CouponId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: UserCouponId(Uuid::new_v4().to_string()),
            coupon_id,
            user_id,
            is_used: false,
            claimed_at: now,
            used_at: None,
        }
    }
}

/// Join of a held user coupon with its definition, as offered to the
/// checkout screen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableCoupon {
    pub user_coupon: UserCoupon,
    pub coupon: Coupon,
}
