use thiserror::Error;

use crate::domain::order::OrderStatus;
use crate::stores::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("order cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
}

/// Checkout settlement failures. The validation variants are raised
/// before any write happens and are safe to retry after correcting
/// input; `Store` failures after order persistence may leave partial
/// state behind (no compensating rollback exists).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    #[error("shipping address not found for user")]
    AddressNotFound,
    #[error("cart not found for user")]
    CartNotFound,
    #[error("no order lines selected")]
    EmptyOrder,
    #[error("user profile not found")]
    ProfileNotFound,
    #[error("selected coupon is not available")]
    CouponNotAvailable,
    #[error("could not allocate a unique order number")]
    OrderNumberExhausted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SettlementError {
    /// True for failures raised before any mutation; the checkout screen
    /// may show these verbatim and let the user correct their input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AddressNotFound
                | Self::CartNotFound
                | Self::EmptyOrder
                | Self::ProfileNotFound
                | Self::CouponNotAvailable
        )
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::AddressNotFound => "The selected shipping address could not be found.",
            Self::CartNotFound => "Your cart could not be found.",
            Self::EmptyOrder => "There is nothing to order. Add items to your cart first.",
            Self::ProfileNotFound => "Your membership profile could not be loaded.",
            Self::CouponNotAvailable => "The selected coupon is no longer available.",
            Self::OrderNumberExhausted | Self::Store(_) => {
                "Order processing failed. Please try again."
            }
        }
    }
}
