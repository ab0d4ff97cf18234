use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use yesfree_core::domain::address::AddressId;
use yesfree_core::domain::cart::{CartId, CartLineId};
use yesfree_core::domain::coupon::UserCouponId;
use yesfree_core::domain::order::PaymentMethod;
use yesfree_core::domain::user::UserId;
use yesfree_core::projections::OrderView;
use yesfree_core::settlement::SettlementRequest;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub shipping_address_id: String,
    pub cart_id: String,
    #[serde(default)]
    pub cart_line_ids: Option<Vec<String>>,
    #[serde(default)]
    pub user_coupon_id: Option<String>,
    #[serde(default)]
    pub used_points: i64,
    pub payment_method: PaymentMethod,
}

pub async fn settle(
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let request = SettlementRequest {
        user_id: UserId(body.user_id),
        shipping_address_id: AddressId(body.shipping_address_id),
        cart_id: CartId(body.cart_id),
        cart_line_ids: body
            .cart_line_ids
            .map(|ids| ids.into_iter().map(CartLineId).collect()),
        user_coupon_id: body.user_coupon_id.map(UserCouponId),
        used_points: body.used_points,
        payment_method: body.payment_method,
    };

    let order = state.settlement.settle(request).await?;
    let items = state.orders.items_for_order(&order.id).await?;

    Ok((StatusCode::CREATED, Json(OrderView { order, items })))
}
