use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use yesfree_core::errors::SettlementError;
use yesfree_core::stores::StoreError;

use crate::health;
use crate::state::AppState;

pub mod checkout;
pub mod coupons;
pub mod orders;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/checkout", post(checkout::settle))
        .route("/users/{user_id}/coupons/available", get(coupons::list_available))
        .route("/users/{user_id}/coupons/claim", post(coupons::claim))
        .route("/users/{user_id}/orders", get(orders::list_for_user))
        .route("/orders/{order_number}", get(orders::find_by_number))
        .route("/admin/orders/{order_number}/fulfillment", patch(orders::update_fulfillment))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Handler-facing error. Validation failures carry the user-presentable
/// message; persistence failures are logged and collapsed to a generic
/// body.
#[derive(Debug)]
pub enum ApiError {
    Validation(&'static str),
    Unauthorized,
    NotFound,
    Conflict(String),
    Upstream,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream => StatusCode::BAD_GATEWAY,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Validation(message) => (*message).to_string(),
            Self::Unauthorized => "A valid admin token is required.".to_string(),
            Self::NotFound => "Not found.".to_string(),
            Self::Conflict(message) => message.clone(),
            Self::Upstream => "Order processing failed. Please try again.".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.message() })).into_response()
    }
}

impl From<SettlementError> for ApiError {
    fn from(error: SettlementError) -> Self {
        if error.is_validation() {
            return Self::Validation(error.user_message());
        }
        tracing::error!(
            event_name = "checkout.api.settlement_failed",
            error = %error,
            "settlement failed past validation"
        );
        Self::Upstream
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        tracing::error!(
            event_name = "checkout.api.store_failed",
            error = %error,
            "store operation failed"
        );
        Self::Upstream
    }
}
