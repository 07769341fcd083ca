//! Payment gateway integrations via REST API (no SDK dependency)
//!
//! Three providers, one normalized outcome vocabulary. Signature
//! verification and status parsing are pure functions; only checkout
//! and status polling touch the network.

pub mod midtrans;
pub mod saweria;
pub mod tripay;

use serde::{Deserialize, Serialize};

use crate::core::config::Config;
use crate::db::models::{Order, PaymentGateway};
use crate::error::{AppError, ErrorCode};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Provider-agnostic payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedStatus {
    /// Money confirmed, gross amount in IDR
    Paid { amount_idr: i64 },
    /// Terminal failure: expired, canceled or denied
    Expired,
    /// Still awaiting payment (also used for post-settlement noise
    /// like refund notices, which never downgrade an order)
    Pending,
}

/// Provider-reported transaction details, merged into the order row
#[derive(Debug, Clone, Default)]
pub struct PaymentDetails {
    /// Channel or issuer ("qris", "gopay", bank code)
    pub provider: Option<String>,
    /// Provider-side transaction reference
    pub reference: Option<String>,
    /// Payment method label
    pub method: Option<String>,
    /// Provider-reported settlement time, verbatim
    pub paid_time: Option<String>,
}

/// A verified, parsed inbound notification
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    /// Our order id as echoed by the provider
    pub order_id: String,
    pub status: NormalizedStatus,
    /// Provider vocabulary, kept for the audit trail
    pub raw_status: String,
    pub details: PaymentDetails,
}

/// What a checkout call produced; stored on the order and returned to
/// the client as payment instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutArtifacts {
    /// Provider transaction reference
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// Checkout input, borrowed from the order being paid
pub struct CheckoutRequest<'a> {
    pub order_id: &'a str,
    pub amount_idr: i64,
    pub product_title: &'a str,
    pub customer_contact: Option<&'a str>,
}

/// Gateway boundary error
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway not configured: {0}")]
    NotConfigured(&'static str),
    #[error("signature verification failed")]
    BadSignature,
    #[error("amount mismatch: provider reported {reported}, order expects {expected}")]
    AmountMismatch { reported: i64, expected: i64 },
    #[error("malformed provider payload: {0}")]
    BadPayload(String),
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected request: {0}")]
    Rejected(String),
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured(name) => {
                AppError::with_detail(ErrorCode::GatewayNotConfigured, name)
            }
            GatewayError::BadSignature => AppError::new(ErrorCode::SignatureInvalid),
            GatewayError::AmountMismatch { reported, expected } => AppError::with_detail(
                ErrorCode::PaymentMismatch,
                format!("reported {reported}, expected {expected}"),
            ),
            GatewayError::BadPayload(detail) => {
                AppError::with_detail(ErrorCode::InvalidRequest, detail)
            }
            GatewayError::Http(e) => {
                tracing::error!(error = %e, "Gateway request failed");
                AppError::new(ErrorCode::GatewayFailure)
            }
            GatewayError::Rejected(detail) => {
                AppError::with_detail(ErrorCode::GatewayFailure, detail)
            }
        }
    }
}

/// All configured gateways behind one dispatch point
///
/// Providers missing their credentials stay `None` and every call on
/// them fails closed with `NotConfigured`.
#[derive(Clone)]
pub struct PaymentHub {
    pub midtrans: Option<midtrans::Midtrans>,
    pub tripay: Option<tripay::Tripay>,
    pub saweria: Option<saweria::Saweria>,
}

impl PaymentHub {
    pub fn new(config: &Config) -> Result<Self, BoxError> {
        // One HTTP client for every provider; reqwest clients are
        // cheap to clone.
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let midtrans = config
            .midtrans_server_key
            .as_ref()
            .map(|key| midtrans::Midtrans::new(http.clone(), key, &config.midtrans_base_url));

        let tripay = match (&config.tripay_api_key, &config.tripay_private_key) {
            (Some(api_key), Some(private_key)) => Some(tripay::Tripay::new(
                http.clone(),
                api_key,
                private_key,
                &config.tripay_merchant_code,
                &config.tripay_base_url,
            )),
            _ => None,
        };

        let saweria = config.saweria_stream_key.as_ref().map(|stream_key| {
            saweria::Saweria::new(
                http.clone(),
                stream_key,
                &config.saweria_account_id,
                &config.saweria_base_url,
            )
        });

        let configured: Vec<&str> = [
            midtrans.is_some().then_some("midtrans"),
            tripay.is_some().then_some("tripay"),
            saweria.is_some().then_some("saweria"),
        ]
        .into_iter()
        .flatten()
        .collect();
        tracing::info!(gateways = ?configured, "Payment gateways configured");

        Ok(Self {
            midtrans,
            tripay,
            saweria,
        })
    }

    /// Empty hub for tests that never touch a provider
    pub fn disabled() -> Self {
        Self {
            midtrans: None,
            tripay: None,
            saweria: None,
        }
    }

    pub fn is_configured(&self, gateway: PaymentGateway) -> bool {
        match gateway {
            PaymentGateway::Midtrans => self.midtrans.is_some(),
            PaymentGateway::Tripay => self.tripay.is_some(),
            PaymentGateway::Saweria => self.saweria.is_some(),
        }
    }

    /// Create a provider transaction for the order
    pub async fn checkout(
        &self,
        gateway: PaymentGateway,
        req: CheckoutRequest<'_>,
    ) -> Result<CheckoutArtifacts, GatewayError> {
        match gateway {
            PaymentGateway::Midtrans => {
                let gw = self
                    .midtrans
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("midtrans"))?;
                gw.create_transaction(&req).await
            }
            PaymentGateway::Tripay => {
                let gw = self
                    .tripay
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("tripay"))?;
                gw.create_transaction(&req).await
            }
            PaymentGateway::Saweria => {
                let gw = self
                    .saweria
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("saweria"))?;
                Ok(gw.payment_instructions(&req))
            }
        }
    }

    /// Ask the order's provider for its current view of the payment
    /// (the Pull side of reconciliation)
    pub async fn poll_status(
        &self,
        order: &Order,
    ) -> Result<(NormalizedStatus, PaymentDetails), GatewayError> {
        let gateway = order.gateway().ok_or_else(|| {
            GatewayError::BadPayload(format!("unknown gateway {}", order.payment_gateway))
        })?;
        match gateway {
            PaymentGateway::Midtrans => {
                let gw = self
                    .midtrans
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("midtrans"))?;
                gw.fetch_status(&order.id).await
            }
            PaymentGateway::Tripay => {
                let gw = self
                    .tripay
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("tripay"))?;
                let reference = order
                    .payment_ref
                    .as_deref()
                    .ok_or_else(|| {
                        GatewayError::BadPayload("order has no provider reference".into())
                    })?;
                gw.fetch_status(reference).await
            }
            PaymentGateway::Saweria => {
                let gw = self
                    .saweria
                    .as_ref()
                    .ok_or(GatewayError::NotConfigured("saweria"))?;
                gw.fetch_status(&order.id, order.amount_due).await
            }
        }
    }
}

/// Parse a provider IDR amount that may carry a decimal tail
/// ("150000.00"). IDR has no cents; a non-zero fraction is malformed.
pub(crate) fn parse_idr_amount(raw: &str) -> Option<i64> {
    let (whole, fraction) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if !fraction.is_empty() && !fraction.bytes().all(|b| b == b'0') {
        return None;
    }
    whole.parse::<i64>().ok().filter(|n| *n >= 0)
}

/// Amount field that providers send either as a JSON number or string
pub(crate) fn json_amount(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().filter(|v| *v >= 0),
        serde_json::Value::String(s) => parse_idr_amount(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idr_amount() {
        assert_eq!(parse_idr_amount("150000"), Some(150_000));
        assert_eq!(parse_idr_amount("150000.00"), Some(150_000));
        assert_eq!(parse_idr_amount("150000.000"), Some(150_000));
        assert_eq!(parse_idr_amount("0"), Some(0));
        assert_eq!(parse_idr_amount("150000.50"), None);
        assert_eq!(parse_idr_amount("-5"), None);
        assert_eq!(parse_idr_amount("abc"), None);
        assert_eq!(parse_idr_amount(""), None);
    }

    #[test]
    fn test_json_amount() {
        assert_eq!(json_amount(&serde_json::json!(150000)), Some(150_000));
        assert_eq!(json_amount(&serde_json::json!("150000.00")), Some(150_000));
        assert_eq!(json_amount(&serde_json::json!(-1)), None);
        assert_eq!(json_amount(&serde_json::json!(null)), None);
    }

    #[test]
    fn test_gateway_error_to_app_error() {
        let app: AppError = GatewayError::BadSignature.into();
        assert_eq!(app.code, ErrorCode::SignatureInvalid);

        let app: AppError = GatewayError::NotConfigured("tripay").into();
        assert_eq!(app.code, ErrorCode::GatewayNotConfigured);

        let app: AppError = GatewayError::AmountMismatch {
            reported: 5,
            expected: 10,
        }
        .into();
        assert_eq!(app.code, ErrorCode::PaymentMismatch);
    }
}
