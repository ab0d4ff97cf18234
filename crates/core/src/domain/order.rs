use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Human-readable order identifier, `YES-{YYYYMMDD}-{4 digits}`.
/// Unique within the order store; the suffix is random, so callers must
/// retry generation on collision.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn generate(now: DateTime<Utc>, rng: &mut impl Rng) -> Self {
        let suffix: u16 = rng.gen_range(0..10_000);
        Self(format!("YES-{}-{suffix:04}", now.format("%Y%m%d")))
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fulfillment lifecycle. Settlement only ever writes `PaymentPending`;
/// every later transition is an admin write validated against
/// `can_transition_to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PaymentPending,
    Preparing,
    AwaitingShipment,
    Shipping,
    LocalHubArrived,
    InternationalShipping,
    CustomsClearance,
    Delivered,
    CancelRequested,
    ReturnRequested,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentPending => "payment_pending",
            Self::Preparing => "preparing",
            Self::AwaitingShipment => "awaiting_shipment",
            Self::Shipping => "shipping",
            Self::LocalHubArrived => "local_hub_arrived",
            Self::InternationalShipping => "international_shipping",
            Self::CustomsClearance => "customs_clearance",
            Self::Delivered => "delivered",
            Self::CancelRequested => "cancel_requested",
            Self::ReturnRequested => "return_requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "payment_pending" => Some(Self::PaymentPending),
            "preparing" => Some(Self::Preparing),
            "awaiting_shipment" => Some(Self::AwaitingShipment),
            "shipping" => Some(Self::Shipping),
            "local_hub_arrived" => Some(Self::LocalHubArrived),
            "international_shipping" => Some(Self::InternationalShipping),
            "customs_clearance" => Some(Self::CustomsClearance),
            "delivered" => Some(Self::Delivered),
            "cancel_requested" => Some(Self::CancelRequested),
            "return_requested" => Some(Self::ReturnRequested),
            _ => None,
        }
    }

    /// Cancelled and returned orders are excluded from monthly-spend
    /// aggregation so they never advance a membership tier.
    pub fn counts_toward_spend(&self) -> bool {
        !matches!(self, Self::CancelRequested | Self::ReturnRequested)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::PaymentPending, Self::Preparing)
                | (Self::Preparing, Self::AwaitingShipment)
                | (Self::AwaitingShipment, Self::Shipping)
                | (Self::Shipping, Self::LocalHubArrived)
                | (Self::Shipping, Self::Delivered)
                | (Self::LocalHubArrived, Self::InternationalShipping)
                | (Self::InternationalShipping, Self::CustomsClearance)
                | (Self::CustomsClearance, Self::Delivered)
                | (Self::PaymentPending, Self::CancelRequested)
                | (Self::Preparing, Self::CancelRequested)
                | (Self::AwaitingShipment, Self::CancelRequested)
                | (Self::Shipping, Self::ReturnRequested)
                | (Self::LocalHubArrived, Self::ReturnRequested)
                | (Self::InternationalShipping, Self::ReturnRequested)
                | (Self::CustomsClearance, Self::ReturnRequested)
                | (Self::Delivered, Self::ReturnRequested)
        )
    }
}

/// Payment is recorded, never charged. The gateway lives outside this
/// system; status starts `Pending` and stays whatever the back office
/// later writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "card" => Some(Self::Card),
            "transfer" => Some(Self::Transfer),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Immutable financial record. Monetary fields and the shipping snapshot
/// never change after creation; only fulfillment fields (status, courier,
/// tracking, memo) and `earned_points` are written later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount_amount: i64,
    pub used_points: i64,
    pub total_amount: i64,
    pub earned_points: i64,
    pub recipient: String,
    pub recipient_phone: String,
    pub shipping_address: String,
    pub shipping_memo: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub admin_memo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn transition_to(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidOrderTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

/// Per-order line snapshot, frozen at settlement time and independent of
/// later product changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub brand: String,
    pub image_url: Option<String>,
    pub unit_price: i64,
    pub quantity: u32,
    pub line_subtotal: i64,
}
