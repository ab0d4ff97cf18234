use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};

use yesfree_core::coupons::{ClaimOutcome, CouponLedger};
use yesfree_core::domain::address::{AddressId, ShippingAddress};
use yesfree_core::domain::cart::{Cart, CartId, CartLine, CartLineId};
use yesfree_core::domain::coupon::{Coupon, CouponId, DiscountType, UserCouponId};
use yesfree_core::domain::order::PaymentMethod;
use yesfree_core::domain::product::{ProductId, ProductSummary};
use yesfree_core::domain::user::{MembershipTier, UserId, UserProfile};
use yesfree_core::errors::SettlementError;
use yesfree_core::settlement::{SettlementRequest, SettlementService};
use yesfree_core::stores::{AddressStore, CartStore, CouponStore, OrderStore, ProfileStore};
use yesfree_db::repositories::{
    InMemoryAddressStore, InMemoryCartStore, InMemoryCouponStore, InMemoryOrderStore,
    InMemoryProfileStore,
};

struct Fixture {
    carts: Arc<InMemoryCartStore>,
    addresses: Arc<InMemoryAddressStore>,
    profiles: Arc<InMemoryProfileStore>,
    coupons: Arc<InMemoryCouponStore>,
    orders: Arc<InMemoryOrderStore>,
    service: SettlementService,
}

impl Fixture {
    fn new() -> Self {
        let carts = Arc::new(InMemoryCartStore::new());
        let addresses = Arc::new(InMemoryAddressStore::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let coupons = Arc::new(InMemoryCouponStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let service = SettlementService::new(
            carts.clone(),
            addresses.clone(),
            profiles.clone(),
            coupons.clone(),
            orders.clone(),
        );
        Self { carts, addresses, profiles, coupons, orders, service }
    }

    async fn seed_user(&self, tier: MembershipTier, points: i64) -> UserId {
        let user_id = UserId("user-1".to_string());
        self.profiles
            .save(UserProfile { user_id: user_id.clone(), tier, points })
            .await
            .expect("save profile");
        self.addresses
            .save(ShippingAddress {
                id: AddressId("addr-1".to_string()),
                user_id: user_id.clone(),
                country: "KR".to_string(),
                recipient: "Han Seo-yun".to_string(),
                phone: "010-1234-5678".to_string(),
                line1: "12 Hangang-daero".to_string(),
                line2: Some("Apt 301".to_string()),
                memo: Some("Leave at the door".to_string()),
                is_default: true,
                created_at: Utc::now(),
            })
            .await
            .expect("save address");
        user_id
    }

    async fn seed_cart(&self, user_id: &UserId, entries: &[(&str, u32, i64)]) -> (CartId, Vec<CartLineId>) {
        let cart_id = CartId("cart-1".to_string());
        self.carts
            .save_cart(Cart { id: cart_id.clone(), user_id: user_id.clone(), created_at: Utc::now() })
            .await
            .expect("save cart");

        let mut line_ids = Vec::new();
        for (product, quantity, price) in entries {
            self.carts
                .put_product(
                    ProductId(product.to_string()),
                    ProductSummary {
                        name: format!("Product {product}"),
                        brand: "Glow Lab".to_string(),
                        image_url: None,
                        price: *price,
                    },
                )
                .await;
            let line = CartLine::new(
                cart_id.clone(),
                ProductId(product.to_string()),
                *quantity,
                *price,
                BTreeMap::new(),
                Utc::now(),
            );
            let stored = self.carts.upsert_line(line).await.expect("upsert line");
            line_ids.push(stored.id);
        }
        (cart_id, line_ids)
    }

    async fn seed_coupon(&self, user_id: &UserId, coupon: Coupon) -> UserCouponId {
        let code = coupon.code.clone();
        self.coupons.save_coupon(coupon).await.expect("save coupon");
        let ledger = CouponLedger::new(self.coupons.clone());
        match ledger.claim_by_code(user_id, &code, Utc::now()).await.expect("claim") {
            ClaimOutcome::Claimed(user_coupon) => user_coupon.id,
            ClaimOutcome::NotFound => panic!("seeded coupon should be claimable"),
        }
    }

    fn request(&self, user_id: &UserId, cart_id: &CartId) -> SettlementRequest {
        SettlementRequest {
            user_id: user_id.clone(),
            shipping_address_id: AddressId("addr-1".to_string()),
            cart_id: cart_id.clone(),
            cart_line_ids: None,
            user_coupon_id: None,
            used_points: 0,
            payment_method: PaymentMethod::Card,
        }
    }
}

fn welcome_coupon() -> Coupon {
    Coupon {
        id: CouponId("coupon-welcome".to_string()),
        code: "WELCOME10".to_string(),
        title: "Welcome 10,000 won off".to_string(),
        discount_type: DiscountType::Fixed,
        discount_value: 10_000,
        min_order_amount: Some(30_000),
        max_discount_amount: None,
        valid_until: Utc::now() + Duration::days(30),
        active: true,
    }
}

fn percent_coupon() -> Coupon {
    Coupon {
        id: CouponId("coupon-spring".to_string()),
        code: "SPRING15".to_string(),
        title: "Spring 15% off".to_string(),
        discount_type: DiscountType::Percent,
        discount_value: 15,
        min_order_amount: Some(50_000),
        max_discount_amount: Some(20_000),
        valid_until: Utc::now() + Duration::days(30),
        active: true,
    }
}

#[tokio::test]
async fn basic_member_settles_with_fixed_coupon_and_points() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 5_000).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 2, 40_000), ("prod-2", 1, 20_000)]).await;
    let user_coupon_id = fixture.seed_coupon(&user_id, welcome_coupon()).await;

    let mut request = fixture.request(&user_id, &cart_id);
    request.user_coupon_id = Some(user_coupon_id);
    request.used_points = 5_000;

    let order = fixture.service.settle(request).await.expect("settle");

    // 100,000 subtotal + 3,000 basic shipping - 10,000 coupon - 5,000 points.
    assert_eq!(order.subtotal, 100_000);
    assert_eq!(order.shipping_fee, 3_000);
    assert_eq!(order.discount_amount, 10_000);
    assert_eq!(order.used_points, 5_000);
    assert_eq!(order.total_amount, 88_000);

    // 88,000 spend keeps the tier basic, earning 1%.
    assert_eq!(order.earned_points, 880);
    let profile = fixture.profiles.find(&user_id).await.expect("find").expect("profile");
    assert_eq!(profile.tier, MembershipTier::Basic);
    assert_eq!(profile.points, 880);

    // Order number shape and snapshot fields.
    assert!(order.order_number.0.starts_with("YES-"));
    assert_eq!(order.shipping_address, "12 Hangang-daero Apt 301, KR");
    assert_eq!(order.recipient, "Han Seo-yun");

    // Settled lines leave the cart; item snapshots persist.
    assert_eq!(fixture.carts.line_count(&cart_id).await, 0);
    let items = fixture.orders.items_for_order(&order.id).await.expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items.iter().map(|item| item.line_subtotal).sum::<i64>(), 100_000);
}

#[tokio::test]
async fn percent_discount_is_capped_and_tier_recomputed_from_scratch() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Premium, 0).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 150_000)]).await;
    let user_coupon_id = fixture.seed_coupon(&user_id, percent_coupon()).await;

    let mut request = fixture.request(&user_id, &cart_id);
    request.user_coupon_id = Some(user_coupon_id);

    let order = fixture.service.settle(request).await.expect("settle");

    // Premium ships free; 15% of 150,000 is 22,500, capped at 20,000.
    assert_eq!(order.shipping_fee, 0);
    assert_eq!(order.discount_amount, 20_000);
    assert_eq!(order.total_amount, 130_000);

    // Tier is recomputed from this month's spend alone: 130,000 is below
    // the premium threshold, so the stored tier moves down.
    let profile = fixture.profiles.find(&user_id).await.expect("find").expect("profile");
    assert_eq!(profile.tier, MembershipTier::Basic);
    assert_eq!(order.earned_points, 1_300);
}

#[tokio::test]
async fn below_minimum_coupon_discounts_zero_and_survives_for_later() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 20_000)]).await;
    let user_coupon_id = fixture.seed_coupon(&user_id, welcome_coupon()).await;

    let mut request = fixture.request(&user_id, &cart_id);
    request.user_coupon_id = Some(user_coupon_id.clone());

    let order = fixture.service.settle(request).await.expect("settle");
    assert_eq!(order.discount_amount, 0);
    assert_eq!(order.total_amount, 23_000);

    // A coupon that contributed nothing is not consumed.
    let held = fixture
        .coupons
        .find_unused_for_user(&user_coupon_id, &user_id)
        .await
        .expect("lookup");
    assert!(held.is_some());
}

#[tokio::test]
async fn settling_a_subset_keeps_the_other_lines_in_the_cart() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, line_ids) =
        fixture.seed_cart(&user_id, &[("prod-1", 1, 30_000), ("prod-2", 1, 12_000)]).await;

    let mut request = fixture.request(&user_id, &cart_id);
    request.cart_line_ids = Some(vec![line_ids[0].clone()]);

    let order = fixture.service.settle(request).await.expect("settle");
    assert_eq!(order.subtotal, 30_000);
    assert_eq!(fixture.carts.line_count(&cart_id).await, 1);
}

#[tokio::test]
async fn retired_products_drop_out_and_an_all_retired_cart_is_empty() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, _) =
        fixture.seed_cart(&user_id, &[("prod-1", 1, 30_000), ("prod-2", 1, 12_000)]).await;

    fixture.carts.retire_product(&ProductId("prod-2".to_string())).await;
    let order = fixture.service.settle(fixture.request(&user_id, &cart_id)).await.expect("settle");
    assert_eq!(order.subtotal, 30_000);

    // Everything retired: nothing to order.
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-3", 1, 8_000)]).await;
    fixture.carts.retire_product(&ProductId("prod-3".to_string())).await;
    let result = fixture.service.settle(fixture.request(&user_id, &cart_id)).await;
    assert!(matches!(result, Err(SettlementError::EmptyOrder)));
}

#[tokio::test]
async fn validation_failures_come_back_typed_and_write_nothing() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 30_000)]).await;

    let mut request = fixture.request(&user_id, &cart_id);
    request.shipping_address_id = AddressId("addr-unknown".to_string());
    assert!(matches!(
        fixture.service.settle(request).await,
        Err(SettlementError::AddressNotFound)
    ));

    let mut request = fixture.request(&user_id, &cart_id);
    request.cart_id = CartId("cart-unknown".to_string());
    assert!(matches!(fixture.service.settle(request).await, Err(SettlementError::CartNotFound)));

    let mut request = fixture.request(&user_id, &cart_id);
    request.user_coupon_id = Some(UserCouponId("uc-unknown".to_string()));
    assert!(matches!(
        fixture.service.settle(request).await,
        Err(SettlementError::CouponNotAvailable)
    ));

    // No order was created and the cart is intact.
    assert_eq!(fixture.orders.order_count().await, 0);
    assert_eq!(fixture.carts.line_count(&cart_id).await, 1);
}

#[tokio::test]
async fn missing_profile_is_a_typed_validation_failure() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 30_000)]).await;

    // Address and cart belong to a user with no profile row.
    let stranger = UserId("user-2".to_string());
    fixture
        .addresses
        .save(ShippingAddress {
            id: AddressId("addr-2".to_string()),
            user_id: stranger.clone(),
            country: "KR".to_string(),
            recipient: "Kim Ji-ho".to_string(),
            phone: "010-2345-6789".to_string(),
            line1: "88 Teheran-ro".to_string(),
            line2: None,
            memo: None,
            is_default: true,
            created_at: Utc::now(),
        })
        .await
        .expect("save address");
    fixture
        .carts
        .save_cart(Cart {
            id: CartId("cart-2".to_string()),
            user_id: stranger.clone(),
            created_at: Utc::now(),
        })
        .await
        .expect("save cart");
    let line = CartLine::new(
        CartId("cart-2".to_string()),
        ProductId("prod-1".to_string()),
        1,
        30_000,
        BTreeMap::new(),
        Utc::now(),
    );
    fixture.carts.upsert_line(line).await.expect("upsert");

    let mut request = fixture.request(&stranger, &CartId("cart-2".to_string()));
    request.shipping_address_id = AddressId("addr-2".to_string());
    assert!(matches!(
        fixture.service.settle(request).await,
        Err(SettlementError::ProfileNotFound)
    ));

    // The original user's cart was untouched by any of this.
    assert_eq!(fixture.carts.line_count(&cart_id).await, 1);
}

#[tokio::test]
async fn double_submit_burns_the_coupon_and_the_points_only_once() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 5_000).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 60_000)]).await;
    let user_coupon_id = fixture.seed_coupon(&user_id, welcome_coupon()).await;

    let mut first = fixture.request(&user_id, &cart_id);
    first.user_coupon_id = Some(user_coupon_id.clone());
    first.used_points = 5_000;
    let order = fixture.service.settle(first).await.expect("first settle");
    assert_eq!(order.used_points, 5_000);

    // The duplicate submission finds the coupon consumed and fails
    // validation before writing anything.
    let (second_cart, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 60_000)]).await;
    let mut second = fixture.request(&user_id, &second_cart);
    second.user_coupon_id = Some(user_coupon_id);
    second.used_points = 5_000;
    assert!(matches!(
        fixture.service.settle(second).await,
        Err(SettlementError::CouponNotAvailable)
    ));
    assert_eq!(fixture.orders.order_count().await, 1);

    // Balance went to zero at the debit and then earned 1% of the total;
    // a second debit of 5,000 never happened.
    let profile = fixture.profiles.find(&user_id).await.expect("find").expect("profile");
    assert_eq!(profile.points, order.earned_points);
}

#[tokio::test]
async fn order_insert_failure_propagates_and_keeps_the_cart() {
    let fixture = Fixture::new();
    let user_id = fixture.seed_user(MembershipTier::Basic, 0).await;
    let (cart_id, _) = fixture.seed_cart(&user_id, &[("prod-1", 1, 30_000)]).await;

    fixture.orders.set_fail_inserts(true).await;
    let result = fixture.service.settle(fixture.request(&user_id, &cart_id)).await;
    assert!(matches!(result, Err(SettlementError::Store(_))));
    assert_eq!(fixture.carts.line_count(&cart_id).await, 1);
}
