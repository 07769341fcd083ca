//! Saweria integration (donation pool)
//!
//! Saweria has no per-order transactions: the customer donates the
//! exact amount with the order code in the donation message. Webhooks
//! are signed with HMAC-SHA256 over the canonical donation fields;
//! status lookups are keyed by (order code, expected amount), and a
//! completed donation with the wrong amount is a verification failure,
//! never a payment.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{
    CheckoutArtifacts, CheckoutRequest, GatewayError, NormalizedEvent, NormalizedStatus,
    PaymentDetails, json_amount,
};

#[derive(Clone)]
pub struct Saweria {
    http: reqwest::Client,
    stream_key: String,
    account_id: String,
    base_url: String,
}

impl Saweria {
    pub fn new(http: reqwest::Client, stream_key: &str, account_id: &str, base_url: &str) -> Self {
        Self {
            http,
            stream_key: stream_key.to_string(),
            account_id: account_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// No provider transaction exists; checkout is a prefilled
    /// donation link plus the code the customer must put in the
    /// message field.
    pub fn payment_instructions(&self, req: &CheckoutRequest<'_>) -> CheckoutArtifacts {
        CheckoutArtifacts {
            reference: req.order_id.to_string(),
            pay_url: Some(format!(
                "{}/{}?amount={}&message={}",
                self.base_url, self.account_id, req.amount_idr, req.order_id
            )),
            qr_string: None,
            pay_code: Some(req.order_id.to_string()),
            expires_at: None,
        }
    }

    /// Donation-pool lookup: did a completed donation carrying this
    /// order code and exactly this amount arrive?
    pub async fn fetch_status(
        &self,
        order_id: &str,
        expected_amount: i64,
    ) -> Result<(NormalizedStatus, PaymentDetails), GatewayError> {
        let resp: serde_json::Value = self
            .http
            .get(format!("{}/api/v1/donations/check", self.base_url))
            .query(&[
                ("account", self.account_id.as_str()),
                ("ref", order_id),
                ("amount", &expected_amount.to_string()),
            ])
            .bearer_auth(&self.stream_key)
            .send()
            .await?
            .json()
            .await?;

        let raw_status = resp["status"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected(format!("Saweria status failed: {resp}")))?;
        if raw_status != "completed" {
            return Ok((NormalizedStatus::Pending, PaymentDetails::default()));
        }

        let amount = json_amount(&resp["amount"]).unwrap_or(0);
        if amount != expected_amount {
            return Err(GatewayError::AmountMismatch {
                reported: amount,
                expected: expected_amount,
            });
        }

        let details = PaymentDetails {
            provider: Some("saweria".to_string()),
            reference: resp["id"].as_str().map(String::from),
            method: Some("donation".to_string()),
            paid_time: resp["created_at"].as_str().map(String::from),
        };
        Ok((NormalizedStatus::Paid { amount_idr: amount }, details))
    }

    /// Verify and parse a donation webhook. The order id is the first
    /// token of the donation message; amount equality against the
    /// order is the caller's job since the order is not loaded here.
    pub fn parse_notification(
        &self,
        body: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, GatewayError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::BadPayload(format!("invalid JSON: {e}")))?;

        let version = payload["version"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing version".into()))?;
        let id = payload["id"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing id".into()))?;
        let amount = json_amount(&payload["amount_raw"])
            .ok_or_else(|| GatewayError::BadPayload("missing amount_raw".into()))?;
        let donator_name = payload["donator_name"].as_str().unwrap_or("");
        let donator_email = payload["donator_email"].as_str().unwrap_or("");

        self.verify_callback(
            version,
            id,
            amount,
            donator_name,
            donator_email,
            signature_header,
        )?;

        if payload["type"].as_str().unwrap_or("donation") != "donation" {
            return Err(GatewayError::BadPayload(format!(
                "unsupported event type {}",
                payload["type"]
            )));
        }

        let message = payload["message"].as_str().unwrap_or("");
        let order_id = extract_order_ref(message)
            .ok_or_else(|| GatewayError::BadPayload("no order reference in message".into()))?;

        Ok(NormalizedEvent {
            order_id,
            // A donation webhook only fires for settled money
            status: NormalizedStatus::Paid { amount_idr: amount },
            raw_status: "completed".to_string(),
            details: PaymentDetails {
                provider: Some("saweria".to_string()),
                reference: Some(id.to_string()),
                method: Some("donation".to_string()),
                paid_time: payload["created_at"].as_str().map(String::from),
            },
        })
    }

    /// HMAC-SHA256(version + id + amount_raw + donator_name +
    /// donator_email) with the stream key
    fn verify_callback(
        &self,
        version: &str,
        id: &str,
        amount: i64,
        donator_name: &str,
        donator_email: &str,
        signature_header: &str,
    ) -> Result<(), GatewayError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.stream_key.as_bytes())
            .map_err(|_| GatewayError::BadSignature)?;
        mac.update(version.as_bytes());
        mac.update(id.as_bytes());
        mac.update(amount.to_string().as_bytes());
        mac.update(donator_name.as_bytes());
        mac.update(donator_email.as_bytes());

        let provided = hex::decode(signature_header).map_err(|_| GatewayError::BadSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::BadSignature)
    }
}

/// First whitespace-delimited token of the donation message; donors
/// are told to paste the order code there, extra words are tolerated.
fn extract_order_ref(message: &str) -> Option<String> {
    message
        .split_whitespace()
        .next()
        .map(|token| {
            token
                .trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-')
                .to_string()
        })
        .filter(|token| !token.is_empty())
}
