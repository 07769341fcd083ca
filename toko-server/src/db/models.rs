//! Row types and status vocabularies

use serde::{Deserialize, Serialize};

/// Order lifecycle status
///
/// PENDING is the only non-terminal state. PAID and EXPIRED are final;
/// a PAID order is never downgraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created, awaiting payment
    Pending,
    /// Payment confirmed
    Paid,
    /// Window closed without payment
    Expired,
}

impl OrderStatus {
    /// Parse from database string value (uppercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PAID" => Some(Self::Paid),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Database string representation (uppercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Expired => "EXPIRED",
        }
    }

    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Expired)
    }
}

/// Supported payment gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Midtrans,
    Tripay,
    Saweria,
}

impl PaymentGateway {
    /// Parse from database / route string value (lowercase)
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "midtrans" => Some(Self::Midtrans),
            "tripay" => Some(Self::Tripay),
            "saweria" => Some(Self::Saweria),
            _ => None,
        }
    }

    /// Database string representation (lowercase)
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Midtrans => "midtrans",
            Self::Tripay => "tripay",
            Self::Saweria => "saweria",
        }
    }
}

impl std::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub price_idr: i64,
    /// Encrypted payload for legacy single-unit products
    pub legacy_content: Option<String>,
    pub is_active: bool,
    pub is_sold: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// Legacy products carry their payload on the product row itself
    /// instead of the stock pool.
    pub fn is_legacy(&self) -> bool {
        self.legacy_content.is_some()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockItem {
    pub id: String,
    pub product_id: String,
    /// Encrypted payload (AES-256-GCM blob)
    pub content: String,
    pub position: i64,
    pub is_sold: bool,
    pub sold_at: Option<i64>,
    pub order_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Order {
    pub id: String,
    pub product_id: String,
    pub status: String,
    pub quantity: i64,
    /// Total captured at creation (unit price at the time x quantity)
    pub amount_due: i64,
    pub amount_paid: i64,
    pub payment_gateway: String,
    pub payment_provider: Option<String>,
    pub payment_ref: Option<String>,
    pub payment_method: Option<String>,
    pub payment_time: Option<String>,
    pub customer_contact: Option<String>,
    /// JSON blob of gateway checkout artifacts
    pub checkout_payload: Option<String>,
    /// JSON array of allocated stock item ids, allocation order
    pub stock_item_ids: Option<String>,
    pub email_sent: bool,
    pub paid_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending.as_db()
    }

    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid.as_db()
    }

    pub fn is_expired(&self) -> bool {
        self.status == OrderStatus::Expired.as_db()
    }

    /// A paid order whose money already landed needs no further
    /// state work, only email repair.
    pub fn is_settled(&self) -> bool {
        self.is_paid() && self.amount_paid > 0
    }

    pub fn gateway(&self) -> Option<PaymentGateway> {
        PaymentGateway::from_db(&self.payment_gateway)
    }

    /// Allocated stock item ids, empty when none recorded
    pub fn stock_ids(&self) -> Vec<String> {
        self.stock_item_ids
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessToken {
    pub id: String,
    pub order_id: String,
    pub token: String,
    pub usage_count: i64,
    pub last_accessed_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub provider: String,
    pub order_id: Option<String>,
    pub raw_status: Option<String>,
    pub verified: bool,
    pub received_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_round_trip() {
        for status in [OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Expired] {
            assert_eq!(OrderStatus::from_db(status.as_db()), Some(status));
        }
        assert_eq!(OrderStatus::from_db("paid"), None);
        assert_eq!(OrderStatus::from_db(""), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Paid.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
    }

    #[test]
    fn test_gateway_db_round_trip() {
        for gw in [
            PaymentGateway::Midtrans,
            PaymentGateway::Tripay,
            PaymentGateway::Saweria,
        ] {
            assert_eq!(PaymentGateway::from_db(gw.as_db()), Some(gw));
        }
        assert_eq!(PaymentGateway::from_db("stripe"), None);
    }

    #[test]
    fn test_order_stock_ids_parsing() {
        let mut order = sample_order();
        assert!(order.stock_ids().is_empty());

        order.stock_item_ids = Some(r#"["a","b"]"#.to_string());
        assert_eq!(order.stock_ids(), vec!["a".to_string(), "b".to_string()]);

        order.stock_item_ids = Some("not json".to_string());
        assert!(order.stock_ids().is_empty());
    }

    #[test]
    fn test_settled_requires_recorded_amount() {
        let mut order = sample_order();
        order.status = OrderStatus::Paid.as_db().to_string();
        order.amount_paid = 0;
        assert!(!order.is_settled());
        order.amount_paid = 150_000;
        assert!(order.is_settled());
    }

    fn sample_order() -> Order {
        Order {
            id: "ord-1".into(),
            product_id: "prod-1".into(),
            status: OrderStatus::Pending.as_db().into(),
            quantity: 1,
            amount_due: 150_000,
            amount_paid: 0,
            payment_gateway: "midtrans".into(),
            payment_provider: None,
            payment_ref: None,
            payment_method: None,
            payment_time: None,
            customer_contact: None,
            checkout_payload: None,
            stock_item_ids: None,
            email_sent: false,
            paid_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }
}
