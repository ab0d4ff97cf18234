//! Sqlite-backed implementations of the core store traits, plus in-memory
//! fakes for tests. Timestamps are stored as RFC 3339 TEXT; money columns
//! are INTEGER minor units.

use chrono::{DateTime, Utc};
use yesfree_core::stores::StoreError;

pub mod address;
pub mod cart;
pub mod coupon;
pub mod memory;
pub mod order;
pub mod profile;

pub use address::SqlAddressStore;
pub use cart::SqlCartStore;
pub use coupon::SqlCouponStore;
pub use memory::{
    InMemoryAddressStore, InMemoryCartStore, InMemoryCouponStore, InMemoryOrderStore,
    InMemoryProfileStore,
};
pub use order::SqlOrderStore;
pub use profile::SqlProfileStore;

pub(crate) fn db_error(source: sqlx::Error) -> StoreError {
    StoreError::backend(source)
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| {
        StoreError::decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| StoreError::decode(format!("invalid timestamp in `{column}`: `{value}` ({error})")),
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    value.map(|value| parse_timestamp(column, value)).transpose()
}
