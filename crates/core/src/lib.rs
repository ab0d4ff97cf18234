pub mod config;
pub mod coupons;
pub mod domain;
pub mod errors;
pub mod loyalty;
pub mod pricing;
pub mod projections;
pub mod settlement;
pub mod stores;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, DatabaseConfig, LoadOptions, LogFormat,
    LoggingConfig, ServerConfig,
};
pub use coupons::{ClaimOutcome, CouponLedger};
pub use domain::address::{AddressId, ShippingAddress};
pub use domain::cart::{Cart, CartId, CartLine, CartLineId};
pub use domain::coupon::{AvailableCoupon, Coupon, CouponId, DiscountType, UserCoupon, UserCouponId};
pub use domain::order::{
    Order, OrderId, OrderItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
};
pub use domain::product::{ProductId, ProductSummary};
pub use domain::user::{MembershipTier, UserId, UserProfile};
pub use errors::{DomainError, SettlementError};
pub use loyalty::LoyaltyLedger;
pub use projections::{CartLineView, CartView, OrderView};
pub use settlement::{SettlementConfig, SettlementRequest, SettlementService, Totals};
pub use stores::{
    AddressStore, CartStore, CouponStore, FulfillmentUpdate, OrderStore, ProfileStore, StoreError,
};
