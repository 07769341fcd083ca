//! Order receipt delivery over Amazon SES
//!
//! Email is strictly best-effort: a failed send never fails payment
//! processing, it only leaves `email_sent` unset so a later
//! reconciliation can repair it.

use async_trait::async_trait;
use aws_sdk_sesv2::Client as SesClient;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything the receipt email needs, borrowed from the caller
pub struct OrderReceipt<'a> {
    pub order_id: &'a str,
    pub product_name: &'a str,
    pub amount_idr: i64,
    pub access_url: &'a str,
}

/// Outbound mail seam. Production uses SES; tests count invocations.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_order_receipt(&self, to: &str, receipt: &OrderReceipt<'_>)
    -> Result<(), BoxError>;
}

/// SES-backed mailer
pub struct SesMailer {
    client: SesClient,
    from: String,
}

impl SesMailer {
    pub fn new(client: SesClient, from: impl Into<String>) -> Self {
        Self {
            client,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for SesMailer {
    async fn send_order_receipt(
        &self,
        to: &str,
        receipt: &OrderReceipt<'_>,
    ) -> Result<(), BoxError> {
        let subject = Content::builder()
            .data(format!(
                "Pesanan selesai / Order complete: {}",
                receipt.product_name
            ))
            .build()?;

        let amount = format_idr(receipt.amount_idr);
        let body_text = format!(
            "Pembayaran untuk \"{product}\" ({amount}) telah kami terima.\n\
             Nomor pesanan: {order_id}\n\
             Akses produk Anda di sini: {url}\n\n\
             We received your payment for \"{product}\" ({amount}).\n\
             Order number: {order_id}\n\
             Access your product here: {url}",
            product = receipt.product_name,
            amount = amount,
            order_id = receipt.order_id,
            url = receipt.access_url,
        );

        let body = Body::builder()
            .text(Content::builder().data(body_text).build()?)
            .build();

        let message = Message::builder().subject(subject).body(body).build();

        self.client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(to).build())
            .content(EmailContent::builder().simple(message).build())
            .send()
            .await?;

        tracing::info!(to = to, order_id = receipt.order_id, "Order receipt sent");
        Ok(())
    }
}

/// Mailer that drops everything. Used when SES is not configured
/// (local development without AWS credentials).
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_order_receipt(
        &self,
        to: &str,
        receipt: &OrderReceipt<'_>,
    ) -> Result<(), BoxError> {
        tracing::warn!(
            to = to,
            order_id = receipt.order_id,
            "Mailer not configured, receipt not sent"
        );
        Ok(())
    }
}

/// Format an IDR amount with Indonesian thousands separators: `Rp 150.000`
pub fn format_idr(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_idr() {
        assert_eq!(format_idr(0), "Rp 0");
        assert_eq!(format_idr(999), "Rp 999");
        assert_eq!(format_idr(1000), "Rp 1.000");
        assert_eq!(format_idr(150000), "Rp 150.000");
        assert_eq!(format_idr(1234567), "Rp 1.234.567");
    }
}
