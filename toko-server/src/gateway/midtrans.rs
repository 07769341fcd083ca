//! Midtrans integration (Snap checkout + Core API status)
//!
//! Notifications are authenticated by the documented digest:
//! SHA-512(order_id + status_code + gross_amount + server_key).

use sha2::{Digest, Sha512};

use super::{
    CheckoutArtifacts, CheckoutRequest, GatewayError, NormalizedEvent, NormalizedStatus,
    PaymentDetails, parse_idr_amount,
};
use crate::util::constant_time_eq;

#[derive(Clone)]
pub struct Midtrans {
    http: reqwest::Client,
    server_key: String,
    /// Core API host (api.midtrans.com or the sandbox twin)
    api_base: String,
    /// Snap host, derived from the API host
    snap_base: String,
}

impl Midtrans {
    pub fn new(http: reqwest::Client, server_key: &str, api_base: &str) -> Self {
        let api_base = api_base.trim_end_matches('/').to_string();
        // api.midtrans.com pairs with app.midtrans.com, same for sandbox
        let snap_base = api_base.replace("//api.", "//app.");
        Self {
            http,
            server_key: server_key.to_string(),
            api_base,
            snap_base,
        }
    }

    /// Create a Snap transaction; the customer pays on the hosted page
    pub async fn create_transaction(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutArtifacts, GatewayError> {
        let mut body = serde_json::json!({
            "transaction_details": {
                "order_id": req.order_id,
                "gross_amount": req.amount_idr,
            },
            "item_details": [{
                "id": req.order_id,
                "price": req.amount_idr,
                "quantity": 1,
                "name": req.product_title,
            }],
        });
        if let Some(email) = req.customer_contact {
            body["customer_details"] = serde_json::json!({ "email": email });
        }

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/snap/v1/transactions", self.snap_base))
            .basic_auth(&self.server_key, None::<&str>)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let redirect_url = resp["redirect_url"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected(format!("Midtrans create failed: {resp}")))?;

        Ok(CheckoutArtifacts {
            // Midtrans keys everything by the merchant order id
            reference: req.order_id.to_string(),
            pay_url: Some(redirect_url.to_string()),
            qr_string: None,
            pay_code: None,
            expires_at: None,
        })
    }

    /// Core API status lookup, keyed by our order id
    pub async fn fetch_status(
        &self,
        order_id: &str,
    ) -> Result<(NormalizedStatus, PaymentDetails), GatewayError> {
        let resp: serde_json::Value = self
            .http
            .get(format!("{}/v2/{}/status", self.api_base, order_id))
            .basic_auth(&self.server_key, None::<&str>)
            .send()
            .await?
            .json()
            .await?;

        // 404 means the provider has no record yet: still unpaid
        if resp["status_code"].as_str() == Some("404") {
            return Ok((NormalizedStatus::Pending, PaymentDetails::default()));
        }

        let transaction_status = resp["transaction_status"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected(format!("Midtrans status failed: {resp}")))?;
        let amount = resp["gross_amount"]
            .as_str()
            .and_then(parse_idr_amount)
            .unwrap_or(0);
        let status = normalize(transaction_status, resp["fraud_status"].as_str(), amount);

        Ok((status, details_from(&resp)))
    }

    /// Verify and parse an HTTP notification body
    pub fn parse_notification(&self, body: &[u8]) -> Result<NormalizedEvent, GatewayError> {
        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::BadPayload(format!("invalid JSON: {e}")))?;

        let order_id = payload["order_id"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing order_id".into()))?;
        let status_code = payload["status_code"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing status_code".into()))?;
        let gross_amount = payload["gross_amount"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing gross_amount".into()))?;
        let signature_key = payload["signature_key"]
            .as_str()
            .ok_or(GatewayError::BadSignature)?;

        self.verify_digest(order_id, status_code, gross_amount, signature_key)?;

        let transaction_status = payload["transaction_status"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing transaction_status".into()))?;
        let amount = parse_idr_amount(gross_amount)
            .ok_or_else(|| GatewayError::BadPayload(format!("bad gross_amount {gross_amount}")))?;
        let status = normalize(transaction_status, payload["fraud_status"].as_str(), amount);

        Ok(NormalizedEvent {
            order_id: order_id.to_string(),
            status,
            raw_status: transaction_status.to_string(),
            details: details_from(&payload),
        })
    }

    fn verify_digest(
        &self,
        order_id: &str,
        status_code: &str,
        gross_amount: &str,
        signature_key: &str,
    ) -> Result<(), GatewayError> {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        let expected = hasher.finalize();

        let provided = hex::decode(signature_key).map_err(|_| GatewayError::BadSignature)?;
        if !constant_time_eq(&expected, &provided) {
            return Err(GatewayError::BadSignature);
        }
        Ok(())
    }
}

fn details_from(payload: &serde_json::Value) -> PaymentDetails {
    PaymentDetails {
        provider: payload["acquirer"]
            .as_str()
            .or_else(|| payload["issuer"].as_str())
            .map(String::from),
        reference: payload["transaction_id"].as_str().map(String::from),
        method: payload["payment_type"].as_str().map(String::from),
        paid_time: payload["settlement_time"]
            .as_str()
            .or_else(|| payload["transaction_time"].as_str())
            .map(String::from),
    }
}

/// Midtrans vocabulary -> normalized outcome
///
/// `capture` only counts once fraud review accepts it. Refund and
/// chargeback notices map to Pending: they arrive after settlement
/// and must never downgrade a paid order.
fn normalize(
    transaction_status: &str,
    fraud_status: Option<&str>,
    amount_idr: i64,
) -> NormalizedStatus {
    match transaction_status {
        "settlement" => NormalizedStatus::Paid { amount_idr },
        "capture" => match fraud_status {
            Some("accept") | None => NormalizedStatus::Paid { amount_idr },
            Some("challenge") => NormalizedStatus::Pending,
            Some(_) => NormalizedStatus::Expired,
        },
        "deny" | "cancel" | "expire" | "failure" => NormalizedStatus::Expired,
        "pending" => NormalizedStatus::Pending,
        _ => NormalizedStatus::Pending,
    }
}
