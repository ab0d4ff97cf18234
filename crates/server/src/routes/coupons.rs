use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use yesfree_core::coupons::ClaimOutcome;
use yesfree_core::domain::coupon::{AvailableCoupon, UserCoupon};
use yesfree_core::domain::user::UserId;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    /// Order amount the coupons must clear; coupons below their minimum
    /// are filtered out. Defaults to zero, which lists only coupons
    /// without a minimum.
    #[serde(default)]
    pub order_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct AvailableResponse {
    pub coupons: Vec<AvailableCoupon>,
}

pub async fn list_available(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<AvailableResponse>, ApiError> {
    let coupons = state
        .coupon_ledger
        .list_available(&UserId(user_id), query.order_amount, Utc::now())
        .await?;
    Ok(Json(AvailableResponse { coupons }))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub code: String,
}

/// `claimed: false` covers every rejection: unknown code, inactive,
/// expired, or already held. The response shape never reveals which.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claimed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<UserCoupon>,
}

pub async fn claim(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    let outcome = state.coupon_ledger.claim_by_code(&UserId(user_id), &body.code, Utc::now()).await?;

    let response = match outcome {
        ClaimOutcome::Claimed(coupon) => ClaimResponse { claimed: true, coupon: Some(coupon) },
        ClaimOutcome::NotFound => ClaimResponse { claimed: false, coupon: None },
    };
    Ok(Json(response))
}
