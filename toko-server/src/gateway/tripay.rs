//! Tripay integration (closed payment, QRIS channel)
//!
//! Requests are signed with HMAC-SHA256(merchant_code + merchant_ref +
//! amount); callbacks carry HMAC-SHA256 of the raw body in the
//! X-Callback-Signature header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{
    CheckoutArtifacts, CheckoutRequest, GatewayError, NormalizedEvent, NormalizedStatus,
    PaymentDetails, json_amount,
};

/// Payment channel requested at checkout
const CHANNEL: &str = "QRIS";

#[derive(Clone)]
pub struct Tripay {
    http: reqwest::Client,
    api_key: String,
    private_key: String,
    merchant_code: String,
    base_url: String,
}

impl Tripay {
    pub fn new(
        http: reqwest::Client,
        api_key: &str,
        private_key: &str,
        merchant_code: &str,
        base_url: &str,
    ) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            private_key: private_key.to_string(),
            merchant_code: merchant_code.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn create_transaction(
        &self,
        req: &CheckoutRequest<'_>,
    ) -> Result<CheckoutArtifacts, GatewayError> {
        let signature = self.request_signature(req.order_id, req.amount_idr)?;
        let body = serde_json::json!({
            "method": CHANNEL,
            "merchant_ref": req.order_id,
            "amount": req.amount_idr,
            "customer_name": req.customer_contact.unwrap_or("Customer"),
            "customer_email": req.customer_contact.unwrap_or("no-reply@invalid"),
            "order_items": [{
                "sku": req.order_id,
                "name": req.product_title,
                "price": req.amount_idr,
                "quantity": 1,
            }],
            "signature": signature,
        });

        let resp: serde_json::Value = self
            .http
            .post(format!("{}/transaction/create", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp["success"] != serde_json::json!(true) {
            return Err(GatewayError::Rejected(format!(
                "Tripay create failed: {resp}"
            )));
        }

        let data = &resp["data"];
        let reference = data["reference"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected(format!("Tripay create failed: {resp}")))?;

        Ok(CheckoutArtifacts {
            reference: reference.to_string(),
            pay_url: data["checkout_url"].as_str().map(String::from),
            qr_string: data["qr_string"].as_str().map(String::from),
            pay_code: data["pay_code"].as_str().map(String::from),
            expires_at: data["expired_time"].as_i64().map(|t| t.to_string()),
        })
    }

    /// Status lookup keyed by the Tripay reference from checkout
    pub async fn fetch_status(
        &self,
        reference: &str,
    ) -> Result<(NormalizedStatus, PaymentDetails), GatewayError> {
        let resp: serde_json::Value = self
            .http
            .get(format!("{}/transaction/detail", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("reference", reference)])
            .send()
            .await?
            .json()
            .await?;

        if resp["success"] != serde_json::json!(true) {
            return Err(GatewayError::Rejected(format!(
                "Tripay status failed: {resp}"
            )));
        }

        let data = &resp["data"];
        let raw_status = data["status"]
            .as_str()
            .ok_or_else(|| GatewayError::Rejected(format!("Tripay status failed: {resp}")))?;
        let amount = json_amount(&data["amount_received"])
            .or_else(|| json_amount(&data["amount"]))
            .unwrap_or(0);

        Ok((normalize(raw_status, amount), details_from(data)))
    }

    /// Verify the raw callback body against X-Callback-Signature and
    /// parse it into a normalized event
    pub fn parse_notification(
        &self,
        body: &[u8],
        signature_header: &str,
    ) -> Result<NormalizedEvent, GatewayError> {
        self.verify_callback(body, signature_header)?;

        let payload: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| GatewayError::BadPayload(format!("invalid JSON: {e}")))?;

        let order_id = payload["merchant_ref"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing merchant_ref".into()))?;
        let raw_status = payload["status"]
            .as_str()
            .ok_or_else(|| GatewayError::BadPayload("missing status".into()))?;
        let amount = json_amount(&payload["total_amount"])
            .or_else(|| json_amount(&payload["amount_received"]))
            .unwrap_or(0);

        Ok(NormalizedEvent {
            order_id: order_id.to_string(),
            status: normalize(raw_status, amount),
            raw_status: raw_status.to_string(),
            details: details_from(&payload),
        })
    }

    fn verify_callback(&self, body: &[u8], signature_header: &str) -> Result<(), GatewayError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.private_key.as_bytes())
            .map_err(|_| GatewayError::BadSignature)?;
        mac.update(body);

        let provided = hex::decode(signature_header).map_err(|_| GatewayError::BadSignature)?;
        mac.verify_slice(&provided)
            .map_err(|_| GatewayError::BadSignature)
    }

    /// HMAC-SHA256(merchant_code + merchant_ref + amount), hex
    fn request_signature(&self, merchant_ref: &str, amount: i64) -> Result<String, GatewayError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.private_key.as_bytes())
            .map_err(|_| GatewayError::BadPayload("HMAC key error".into()))?;
        mac.update(self.merchant_code.as_bytes());
        mac.update(merchant_ref.as_bytes());
        mac.update(amount.to_string().as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

fn details_from(payload: &serde_json::Value) -> PaymentDetails {
    PaymentDetails {
        provider: payload["payment_method"].as_str().map(String::from),
        reference: payload["reference"].as_str().map(String::from),
        method: payload["payment_method_code"]
            .as_str()
            .or_else(|| payload["payment_method"].as_str())
            .map(String::from),
        paid_time: payload["paid_at"].as_i64().map(|t| t.to_string()),
    }
}

/// Tripay vocabulary -> normalized outcome. REFUND arrives only after
/// payment and must never downgrade, so it maps to Pending.
fn normalize(status: &str, amount_idr: i64) -> NormalizedStatus {
    match status {
        "PAID" | "SUCCESS" => NormalizedStatus::Paid { amount_idr },
        "EXPIRED" | "FAILED" => NormalizedStatus::Expired,
        "UNPAID" => NormalizedStatus::Pending,
        _ => NormalizedStatus::Pending,
    }
}
