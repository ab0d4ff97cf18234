use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};

use yesfree_core::domain::address::{AddressId, ShippingAddress};
use yesfree_core::domain::cart::{Cart, CartId, CartLine};
use yesfree_core::domain::coupon::{Coupon, CouponId, DiscountType, UserCoupon};
use yesfree_core::domain::order::{
    Order, OrderId, OrderItem, OrderNumber, OrderStatus, PaymentMethod, PaymentStatus,
};
use yesfree_core::domain::user::{MembershipTier, UserId, UserProfile};
use yesfree_core::stores::{
    AddressStore, CartStore, CouponStore, FulfillmentUpdate, OrderStore, ProfileStore,
};
use yesfree_db::migrations::run_pending;
use yesfree_db::repositories::{
    SqlAddressStore, SqlCartStore, SqlCouponStore, SqlOrderStore, SqlProfileStore,
};
use yesfree_db::{connect_memory, DbPool};

async fn pool() -> DbPool {
    let pool = connect_memory().await.expect("connect");
    run_pending(&pool).await.expect("run migrations");
    pool
}

fn user() -> UserId {
    UserId("user-1".to_string())
}

async fn insert_product(pool: &DbPool, id: &str, price: i64) {
    sqlx::query("INSERT INTO product (id, name, brand, image_url, price) VALUES (?, ?, ?, NULL, ?)")
        .bind(id)
        .bind(format!("Product {id}"))
        .bind("Glow Lab")
        .bind(price)
        .execute(pool)
        .await
        .expect("insert product");
}

fn order(number: &str, total: i64, status: OrderStatus) -> Order {
    let now = Utc.with_ymd_and_hms(2026, 8, 10, 12, 0, 0).single().expect("timestamp");
    Order {
        id: OrderId(format!("order-{number}")),
        order_number: OrderNumber(number.to_string()),
        user_id: user(),
        status,
        subtotal: total,
        shipping_fee: 0,
        discount_amount: 0,
        used_points: 0,
        total_amount: total,
        earned_points: 0,
        recipient: "Han Seo-yun".to_string(),
        recipient_phone: "010-1234-5678".to_string(),
        shipping_address: "12 Hangang-daero, KR".to_string(),
        shipping_memo: None,
        payment_method: PaymentMethod::Card,
        payment_status: PaymentStatus::Pending,
        courier: None,
        tracking_number: None,
        admin_memo: None,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn upsert_line_merges_same_selection_into_one_row() {
    let pool = pool().await;
    let carts = SqlCartStore::new(pool.clone());
    insert_product(&pool, "prod-1", 15_000).await;

    let cart = Cart { id: CartId("cart-1".to_string()), user_id: user(), created_at: Utc::now() };
    carts.save_cart(cart.clone()).await.expect("save cart");

    let options: BTreeMap<String, String> =
        [("size".to_string(), "m".to_string())].into_iter().collect();
    let first = CartLine::new(
        cart.id.clone(),
        yesfree_core::domain::product::ProductId("prod-1".to_string()),
        2,
        15_000,
        options.clone(),
        Utc::now(),
    );
    let second = CartLine::new(
        cart.id.clone(),
        yesfree_core::domain::product::ProductId("prod-1".to_string()),
        1,
        15_000,
        options,
        Utc::now(),
    );

    carts.upsert_line(first).await.expect("first upsert");
    let merged = carts.upsert_line(second).await.expect("second upsert");
    assert_eq!(merged.quantity, 3);

    let lines = carts.lines_for_cart(&cart.id).await.expect("list lines");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
    assert_eq!(lines[0].product.as_ref().expect("product join").price, 15_000);
}

#[tokio::test]
async fn lines_for_cart_surfaces_retired_products_as_none() {
    let pool = pool().await;
    let carts = SqlCartStore::new(pool.clone());

    let cart = Cart { id: CartId("cart-1".to_string()), user_id: user(), created_at: Utc::now() };
    carts.save_cart(cart.clone()).await.expect("save cart");

    let line = CartLine::new(
        cart.id.clone(),
        yesfree_core::domain::product::ProductId("prod-gone".to_string()),
        1,
        9_000,
        BTreeMap::new(),
        Utc::now(),
    );
    carts.upsert_line(line).await.expect("upsert");

    let lines = carts.lines_for_cart(&cart.id).await.expect("list lines");
    assert_eq!(lines.len(), 1);
    assert!(lines[0].product.is_none());
}

#[tokio::test]
async fn address_lookup_is_scoped_to_the_owner() {
    let pool = pool().await;
    let addresses = SqlAddressStore::new(pool.clone());

    let address = ShippingAddress {
        id: AddressId("addr-1".to_string()),
        user_id: user(),
        country: "KR".to_string(),
        recipient: "Han Seo-yun".to_string(),
        phone: "010-1234-5678".to_string(),
        line1: "12 Hangang-daero".to_string(),
        line2: None,
        memo: None,
        is_default: true,
        created_at: Utc::now(),
    };
    addresses.save(address.clone()).await.expect("save");

    let found = addresses.find_for_user(&address.id, &user()).await.expect("find");
    assert!(found.is_some());

    let other = UserId("someone-else".to_string());
    let cross = addresses.find_for_user(&address.id, &other).await.expect("cross find");
    assert!(cross.is_none());
}

#[tokio::test]
async fn set_default_leaves_exactly_one_default() {
    let pool = pool().await;
    let addresses = SqlAddressStore::new(pool.clone());

    for (id, is_default) in [("addr-1", true), ("addr-2", false)] {
        addresses
            .save(ShippingAddress {
                id: AddressId(id.to_string()),
                user_id: user(),
                country: "KR".to_string(),
                recipient: "Han Seo-yun".to_string(),
                phone: "010-1234-5678".to_string(),
                line1: "12 Hangang-daero".to_string(),
                line2: None,
                memo: None,
                is_default,
                created_at: Utc::now(),
            })
            .await
            .expect("save");
    }

    addresses.set_default(&user(), &AddressId("addr-2".to_string())).await.expect("set default");

    let listed = addresses.list_for_user(&user()).await.expect("list");
    let defaults: Vec<_> = listed.iter().filter(|address| address.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id.0, "addr-2");
}

#[tokio::test]
async fn saving_a_new_default_demotes_the_previous_one() {
    let pool = pool().await;
    let addresses = SqlAddressStore::new(pool.clone());

    for id in ["addr-1", "addr-2"] {
        addresses
            .save(ShippingAddress {
                id: AddressId(id.to_string()),
                user_id: user(),
                country: "KR".to_string(),
                recipient: "Han Seo-yun".to_string(),
                phone: "010-1234-5678".to_string(),
                line1: "12 Hangang-daero".to_string(),
                line2: None,
                memo: None,
                is_default: true,
                created_at: Utc::now(),
            })
            .await
            .expect("save");
    }

    let listed = addresses.list_for_user(&user()).await.expect("list");
    let defaults: Vec<_> = listed.iter().filter(|address| address.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id.0, "addr-2");
}

#[tokio::test]
async fn adjust_points_floors_at_zero() {
    let pool = pool().await;
    let profiles = SqlProfileStore::new(pool.clone());

    profiles
        .save(UserProfile { user_id: user(), tier: MembershipTier::Basic, points: 3_000 })
        .await
        .expect("save profile");

    let balance = profiles.adjust_points(&user(), -10_000).await.expect("debit");
    assert_eq!(balance, 0);

    let balance = profiles.adjust_points(&user(), 880).await.expect("credit");
    assert_eq!(balance, 880);
}

#[tokio::test]
async fn adjust_points_requires_an_existing_profile() {
    let pool = pool().await;
    let profiles = SqlProfileStore::new(pool.clone());

    let missing = UserId("ghost".to_string());
    assert!(profiles.adjust_points(&missing, 100).await.is_err());
}

#[tokio::test]
async fn mark_used_burns_a_coupon_exactly_once() {
    let pool = pool().await;
    let coupons = SqlCouponStore::new(pool.clone());
    let now = Utc::now();

    coupons
        .save_coupon(Coupon {
            id: CouponId("coupon-1".to_string()),
            code: "WELCOME10".to_string(),
            title: "Welcome".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 10_000,
            min_order_amount: None,
            max_discount_amount: None,
            valid_until: now + Duration::days(30),
            active: true,
        })
        .await
        .expect("save coupon");

    let held = UserCoupon::issue(CouponId("coupon-1".to_string()), user(), now);
    coupons.save_user_coupon(held.clone()).await.expect("save user coupon");

    assert!(coupons.mark_used(&held.id, now).await.expect("first burn"));
    assert!(!coupons.mark_used(&held.id, now).await.expect("second burn"));

    let remaining = coupons.list_unused_for_user(&user()).await.expect("list unused");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn expired_codes_are_invisible_to_find_active_by_code() {
    let pool = pool().await;
    let coupons = SqlCouponStore::new(pool.clone());
    let now = Utc::now();

    coupons
        .save_coupon(Coupon {
            id: CouponId("coupon-old".to_string()),
            code: "EXPIRED".to_string(),
            title: "Past promo".to_string(),
            discount_type: DiscountType::Fixed,
            discount_value: 5_000,
            min_order_amount: None,
            max_discount_amount: None,
            valid_until: now - Duration::days(1),
            active: true,
        })
        .await
        .expect("save coupon");

    assert!(coupons.find_active_by_code("EXPIRED", now).await.expect("lookup").is_none());
}

#[tokio::test]
async fn duplicate_order_numbers_are_rejected() {
    let pool = pool().await;
    let orders = SqlOrderStore::new(pool.clone());

    orders.insert_order(&order("YES-20260810-0001", 10_000, OrderStatus::PaymentPending)).await
        .expect("first insert");

    let mut duplicate = order("YES-20260810-0001", 20_000, OrderStatus::PaymentPending);
    duplicate.id = OrderId("order-other".to_string());
    assert!(orders.insert_order(&duplicate).await.is_err());
}

#[tokio::test]
async fn order_item_snapshots_survive_product_changes() {
    let pool = pool().await;
    let orders = SqlOrderStore::new(pool.clone());
    insert_product(&pool, "prod-1", 40_000).await;

    let placed = order("YES-20260810-0001", 80_000, OrderStatus::PaymentPending);
    orders.insert_order(&placed).await.expect("insert order");
    orders
        .insert_items(&[OrderItem {
            id: "item-1".to_string(),
            order_id: placed.id.clone(),
            product_id: yesfree_core::domain::product::ProductId("prod-1".to_string()),
            product_name: "Product prod-1".to_string(),
            brand: "Glow Lab".to_string(),
            image_url: None,
            unit_price: 40_000,
            quantity: 2,
            line_subtotal: 80_000,
        }])
        .await
        .expect("insert items");

    // The catalog moves on; the financial record must not.
    sqlx::query("UPDATE product SET price = 55000, name = 'Product prod-1 v2' WHERE id = ?")
        .bind("prod-1")
        .execute(&pool)
        .await
        .expect("update product");

    let items = orders.items_for_order(&placed.id).await.expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_name, "Product prod-1");
    assert_eq!(items[0].unit_price, 40_000);
    assert_eq!(items[0].line_subtotal, 80_000);
}

#[tokio::test]
async fn monthly_spend_skips_cancelled_and_returned_orders() {
    let pool = pool().await;
    let orders = SqlOrderStore::new(pool.clone());

    orders.insert_order(&order("YES-20260810-0001", 80_000, OrderStatus::Delivered)).await
        .expect("insert delivered");
    orders.insert_order(&order("YES-20260810-0002", 50_000, OrderStatus::CancelRequested)).await
        .expect("insert cancelled");
    orders.insert_order(&order("YES-20260810-0003", 30_000, OrderStatus::ReturnRequested)).await
        .expect("insert returned");

    let since = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).single().expect("timestamp");
    let spend = orders.monthly_spend(&user(), since).await.expect("spend");
    assert_eq!(spend, 80_000);
}

#[tokio::test]
async fn fulfillment_updates_never_touch_monetary_fields() {
    let pool = pool().await;
    let orders = SqlOrderStore::new(pool.clone());

    let original = order("YES-20260810-0001", 88_000, OrderStatus::PaymentPending);
    orders.insert_order(&original).await.expect("insert");

    let now = Utc::now();
    let updated = orders
        .update_fulfillment(
            &original.order_number,
            FulfillmentUpdate {
                status: Some(OrderStatus::Preparing),
                courier: Some("YesFree Express".to_string()),
                tracking_number: Some("TRK-001".to_string()),
                admin_memo: None,
            },
            now,
        )
        .await
        .expect("update")
        .expect("order exists");

    assert_eq!(updated.status, OrderStatus::Preparing);
    assert_eq!(updated.courier.as_deref(), Some("YesFree Express"));
    assert_eq!(updated.subtotal, original.subtotal);
    assert_eq!(updated.total_amount, original.total_amount);
    assert_eq!(updated.used_points, original.used_points);
    assert_eq!(updated.shipping_address, original.shipping_address);

    let unknown = orders
        .update_fulfillment(&OrderNumber("YES-00000000-0000".to_string()), FulfillmentUpdate::default(), now)
        .await
        .expect("update unknown");
    assert!(unknown.is_none());
}

#[tokio::test]
async fn orders_list_newest_first() {
    let pool = pool().await;
    let orders = SqlOrderStore::new(pool.clone());

    let mut older = order("YES-20260801-0001", 10_000, OrderStatus::Delivered);
    older.created_at = Utc.with_ymd_and_hms(2026, 8, 1, 9, 0, 0).single().expect("timestamp");
    older.updated_at = older.created_at;
    let newer = order("YES-20260810-0002", 20_000, OrderStatus::PaymentPending);

    orders.insert_order(&older).await.expect("insert older");
    orders.insert_order(&newer).await.expect("insert newer");

    let listed = orders.list_for_user(&user()).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].order_number, newer.order_number);
    assert_eq!(listed[1].order_number, older.order_number);
}
