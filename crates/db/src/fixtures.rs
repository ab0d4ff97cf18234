use sqlx::Executor;

use yesfree_core::stores::StoreError;

use crate::connection::DbPool;
use crate::repositories::db_error;

const SEED_USERS: &[SeedUserContract] = &[
    SeedUserContract {
        user_id: "user-basic-001",
        tier: "basic",
        points: 5_000,
        expected_cart_line_count: 2,
        expected_unused_coupon_count: 1,
        description: "basic shopper with a pre-filled cart and a welcome coupon",
    },
    SeedUserContract {
        user_id: "user-premium-001",
        tier: "premium",
        points: 120_000,
        expected_cart_line_count: 0,
        expected_unused_coupon_count: 0,
        description: "premium shopper, empty cart",
    },
    SeedUserContract {
        user_id: "user-vip-001",
        tier: "vip",
        points: 40_000,
        expected_cart_line_count: 0,
        expected_unused_coupon_count: 0,
        description: "vip shopper shipping to Japan",
    },
];

const SEED_COUPON_CODES: &[&str] = &["WELCOME10", "SPRING15"];
const SEED_PRODUCT_COUNT: i64 = 4;

struct SeedUserContract {
    user_id: &'static str,
    tier: &'static str,
    points: i64,
    expected_cart_line_count: i64,
    expected_unused_coupon_count: i64,
    description: &'static str,
}

/// Demo dataset for local runs: one shopper per membership tier, a small
/// catalog, claimable coupons, and a pre-filled cart.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await.map_err(db_error)?;
        tx.execute(sqlx::query(Self::SQL)).await.map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        let users_seeded = SEED_USERS
            .iter()
            .map(|user| UserSeedInfo { user_id: user.user_id, description: user.description })
            .collect::<Vec<_>>();

        Ok(SeedResult { users_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let product_count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM product")
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
        checks.push(("products", product_count == SEED_PRODUCT_COUNT));

        for code in SEED_COUPON_CODES {
            let coupon_exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM coupon WHERE code = ?1 AND active = 1)",
            )
            .bind(code)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push((*code, coupon_exists == 1));
        }

        for user in SEED_USERS {
            let profile_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM user_profile WHERE user_id = ?1 AND tier = ?2 AND points = ?3)",
            )
            .bind(user.user_id)
            .bind(user.tier)
            .bind(user.points)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push((user.user_id, profile_ok == 1));

            let default_address_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM shipping_address WHERE user_id = ?1 AND is_default = 1",
            )
            .bind(user.user_id)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push(("single default address", default_address_count == 1));

            let cart_line_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM cart_line
                 WHERE cart_id IN (SELECT id FROM cart WHERE user_id = ?1)",
            )
            .bind(user.user_id)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push(("cart lines", cart_line_count == user.expected_cart_line_count));

            let unused_coupon_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM user_coupon WHERE user_id = ?1 AND is_used = 0",
            )
            .bind(user.user_id)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push(("unused coupons", unused_coupon_count == user.expected_unused_coupon_count));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }
}

pub struct SeedResult {
    pub users_seeded: Vec<UserSeedInfo>,
}

pub struct UserSeedInfo {
    pub user_id: &'static str,
    pub description: &'static str,
}

pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
