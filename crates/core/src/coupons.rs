//! Coupon ledger: claim-by-code issuance, availability filtering for the
//! checkout screen, and single-use consumption marking.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::coupon::{AvailableCoupon, UserCoupon};
use crate::domain::user::UserId;
use crate::stores::{CouponStore, StoreError};

/// Claim resolution. Invalid, inactive, expired, and already-held codes
/// all collapse into `NotFound` so the claim form cannot be used to
/// probe which codes exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(UserCoupon),
    NotFound,
}

/// Codes are matched case- and whitespace-insensitively.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Clone)]
pub struct CouponLedger {
    coupons: Arc<dyn CouponStore>,
}

impl CouponLedger {
    pub fn new(coupons: Arc<dyn CouponStore>) -> Self {
        Self { coupons }
    }

    /// Unused holdings the user may apply to an order of `order_amount`:
    /// expired and below-minimum coupons are filtered out. The caller
    /// picks at most one; none is ever forced.
    pub async fn list_available(
        &self,
        user_id: &UserId,
        order_amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<AvailableCoupon>, StoreError> {
        let held = self.coupons.list_unused_for_user(user_id).await?;
        Ok(held
            .into_iter()
            .filter(|entry| {
                !entry.coupon.is_expired(now) && entry.coupon.meets_minimum(order_amount)
            })
            .collect())
    }

    /// Claim a coupon by code. One unused holding per (user, coupon):
    /// re-claiming while an unused instance exists reports `NotFound`
    /// and creates nothing.
    pub async fn claim_by_code(
        &self,
        user_id: &UserId,
        raw_code: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Ok(ClaimOutcome::NotFound);
        }

        let Some(coupon) = self.coupons.find_active_by_code(&code, now).await? else {
            return Ok(ClaimOutcome::NotFound);
        };

        if self.coupons.holds_unused(user_id, &coupon.id).await? {
            return Ok(ClaimOutcome::NotFound);
        }

        let user_coupon = UserCoupon::issue(coupon.id, user_id.clone(), now);
        self.coupons.save_user_coupon(user_coupon.clone()).await?;
        Ok(ClaimOutcome::Claimed(user_coupon))
    }

    /// Consume a user coupon. Returns false when it was already used;
    /// the underlying write is conditional, so two settlements racing on
    /// the same coupon burn it at most once.
    pub async fn mark_used(
        &self,
        id: &crate::domain::coupon::UserCouponId,
        used_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.coupons.mark_used(id, used_at).await
    }
}
