use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The product join shape carried on cart lines and frozen into order
/// items. Catalog management itself lives outside this system; only the
/// fields that get snapshotted at order time are modeled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub brand: String,
    pub image_url: Option<String>,
    /// Current catalog price in minor currency units. Cart lines keep
    /// their own price snapshot; this is the live value from the join.
    pub price: i64,
}
