use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressId(pub String);

/// A saved delivery destination. At most one address per user carries
/// `is_default = true`; the address store clears the previous default
/// when a new one is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: AddressId,
    pub user_id: UserId,
    pub country: String,
    pub recipient: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub memo: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl ShippingAddress {
    /// Single-line rendering copied onto orders at settlement time.
    /// Orders keep this snapshot, so later edits to the address never
    /// change what a past order shipped to.
    pub fn formatted(&self) -> String {
        match &self.line2 {
            Some(line2) if !line2.trim().is_empty() => {
                format!("{} {}, {}", self.line1, line2, self.country)
            }
            _ => format!("{}, {}", self.line1, self.country),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::user::UserId;

    use super::{AddressId, ShippingAddress};

    fn address(line2: Option<&str>) -> ShippingAddress {
        ShippingAddress {
            id: AddressId("A-1".to_string()),
            user_id: UserId("U-1".to_string()),
            country: "KR".to_string(),
            recipient: "Han Seo-yun".to_string(),
            phone: "010-1234-5678".to_string(),
            line1: "12 Hangang-daero".to_string(),
            line2: line2.map(str::to_string),
            memo: None,
            is_default: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn formatted_includes_second_line_when_present() {
        assert_eq!(address(Some("Apt 301")).formatted(), "12 Hangang-daero Apt 301, KR");
    }

    #[test]
    fn formatted_skips_blank_second_line() {
        assert_eq!(address(None).formatted(), "12 Hangang-daero, KR");
        assert_eq!(address(Some("  ")).formatted(), "12 Hangang-daero, KR");
    }
}
