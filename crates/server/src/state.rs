use std::sync::Arc;

use secrecy::SecretString;
use yesfree_core::coupons::CouponLedger;
use yesfree_core::loyalty::LoyaltyLedger;
use yesfree_core::settlement::SettlementService;
use yesfree_core::stores::{AddressStore, CartStore, CouponStore, OrderStore, ProfileStore};
use yesfree_db::repositories::{
    SqlAddressStore, SqlCartStore, SqlCouponStore, SqlOrderStore, SqlProfileStore,
};
use yesfree_db::DbPool;

use crate::bootstrap::Application;

/// Shared handler state. Every collaborator is handed in as a trait
/// object, so tests can swap the sqlite stores for in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub carts: Arc<dyn CartStore>,
    pub addresses: Arc<dyn AddressStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub coupons: Arc<dyn CouponStore>,
    pub orders: Arc<dyn OrderStore>,
    pub settlement: Arc<SettlementService>,
    pub coupon_ledger: CouponLedger,
    pub loyalty: LoyaltyLedger,
    pub admin_token: SecretString,
}

impl AppState {
    pub fn new(app: &Application) -> Self {
        Self::assemble(app.db_pool.clone(), app.config.admin.api_token.clone())
    }

    #[cfg(test)]
    pub fn for_pool(pool: DbPool, admin_token: &str) -> Self {
        Self::assemble(pool, admin_token.to_string().into())
    }

    fn assemble(pool: DbPool, admin_token: SecretString) -> Self {
        let carts: Arc<dyn CartStore> = Arc::new(SqlCartStore::new(pool.clone()));
        let addresses: Arc<dyn AddressStore> = Arc::new(SqlAddressStore::new(pool.clone()));
        let profiles: Arc<dyn ProfileStore> = Arc::new(SqlProfileStore::new(pool.clone()));
        let coupons: Arc<dyn CouponStore> = Arc::new(SqlCouponStore::new(pool.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(SqlOrderStore::new(pool.clone()));

        let settlement = Arc::new(SettlementService::new(
            carts.clone(),
            addresses.clone(),
            profiles.clone(),
            coupons.clone(),
            orders.clone(),
        ));
        let coupon_ledger = CouponLedger::new(coupons.clone());
        let loyalty = LoyaltyLedger::new(profiles.clone(), orders.clone());

        Self {
            db_pool: pool,
            carts,
            addresses,
            profiles,
            coupons,
            orders,
            settlement,
            coupon_ledger,
            loyalty,
            admin_token,
        }
    }
}
