//! Points & tier ledger: monthly-spend aggregation, tier classification,
//! and post-settlement points awarding. Redemption debits are not issued
//! from here; settlement performs them inline so the debit stays in the
//! same step as order creation.

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveTime, Utc};

use crate::domain::order::OrderId;
use crate::domain::user::{MembershipTier, UserId};
use crate::pricing::{classify_tier, earned_points_for};
use crate::stores::{OrderStore, ProfileStore, StoreError};

/// Midnight UTC on the first day of `now`'s calendar month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let first_day = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    first_day.and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct LoyaltyLedger {
    profiles: Arc<dyn ProfileStore>,
    orders: Arc<dyn OrderStore>,
}

impl LoyaltyLedger {
    pub fn new(profiles: Arc<dyn ProfileStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { profiles, orders }
    }

    /// Total paid by the user since the first of the current month.
    /// Cancelled and returned orders are excluded, so they never push a
    /// tier up.
    pub async fn monthly_spend(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.orders.monthly_spend(user_id, month_start(now)).await
    }

    /// Recomputes the tier from scratch and stores it. The tier can move
    /// down when spend drops.
    pub async fn refresh_tier(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<MembershipTier, StoreError> {
        let spend = self.monthly_spend(user_id, now).await?;
        let tier = classify_tier(spend);
        self.profiles.set_tier(user_id, tier).await?;
        Ok(tier)
    }

    /// Awards earn-rate points for a settled order: refresh the tier
    /// first, floor the earn against the paid total, then stamp the
    /// order and credit the balance. Runs strictly after the order and
    /// its points debit are committed, so the earn is computed on the
    /// net payable amount. Returns the points earned (possibly zero).
    pub async fn award_points(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        order_total: i64,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let tier = self.refresh_tier(user_id, now).await?;
        let earned = earned_points_for(order_total, tier);
        if earned > 0 {
            self.orders.set_earned_points(order_id, earned).await?;
            self.profiles.adjust_points(user_id, earned).await?;
        }
        Ok(earned)
    }
}
