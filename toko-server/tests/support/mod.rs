//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::SqlitePool;

use toko_server::core::state::AppState;
use toko_server::crypto::ContentKey;
use toko_server::db::DbService;
use toko_server::db::repository::orders;
use toko_server::email::{Mailer, OrderReceipt};
use toko_server::gateway::{NormalizedStatus, PaymentDetails, PaymentHub};
use toko_server::util::{new_id, now_millis};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const BASE_URL: &str = "https://shop.test";

/// Mailer that counts sends and can be told to fail
#[derive(Default)]
pub struct CountingMailer {
    pub sends: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingMailer {
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for CountingMailer {
    async fn send_order_receipt(
        &self,
        _to: &str,
        _receipt: &OrderReceipt<'_>,
    ) -> Result<(), BoxError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err("smtp unreachable".into());
        }
        Ok(())
    }
}

fn assemble(pool: SqlitePool, mailer: Arc<CountingMailer>, hub: PaymentHub) -> AppState {
    AppState::from_parts(
        pool,
        ContentKey::generate(),
        hub,
        mailer,
        ADMIN_KEY,
        BASE_URL,
    )
}

/// In-memory state with no gateways configured
pub async fn state_in_memory() -> (AppState, Arc<CountingMailer>) {
    state_with_hub(PaymentHub::disabled()).await
}

/// In-memory state with the given gateways wired in
pub async fn state_with_hub(hub: PaymentHub) -> (AppState, Arc<CountingMailer>) {
    let db = DbService::in_memory().await.expect("in-memory db");
    let mailer = Arc::new(CountingMailer::default());
    (assemble(db.pool, mailer.clone(), hub), mailer)
}

/// File-backed state for tests that need genuinely concurrent writers
/// (the in-memory pool is capped at one connection)
pub async fn state_on_disk() -> (AppState, Arc<CountingMailer>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("test.db");
    let db = DbService::new(db_path.to_str().expect("utf-8 path"))
        .await
        .expect("file db");
    let mailer = Arc::new(CountingMailer::default());
    (
        assemble(db.pool, mailer.clone(), PaymentHub::disabled()),
        mailer,
        dir,
    )
}

/// Insert a pooled product, return its id
pub async fn seed_product(pool: &SqlitePool, slug: &str, price_idr: i64) -> String {
    use toko_server::db::repository::products;
    let id = new_id();
    products::create(
        pool,
        products::NewProduct {
            id: &id,
            slug,
            title: &format!("Product {slug}"),
            description: Some("test product"),
            price_idr,
            legacy_content: None,
        },
        now_millis(),
    )
    .await
    .expect("insert product");
    id
}

/// Insert a legacy single-unit product whose payload is encrypted with
/// the state's content key
pub async fn seed_legacy_product(
    state: &AppState,
    slug: &str,
    price_idr: i64,
    plaintext: &str,
) -> String {
    use toko_server::db::repository::products;
    let id = new_id();
    let encrypted = state.content_key.encrypt_string(plaintext).expect("encrypt");
    products::create(
        &state.pool,
        products::NewProduct {
            id: &id,
            slug,
            title: &format!("Product {slug}"),
            description: None,
            price_idr,
            legacy_content: Some(&encrypted),
        },
        now_millis(),
    )
    .await
    .expect("insert legacy product");
    id
}

/// Append encrypted stock units, return their ids in insertion order
pub async fn seed_stock(state: &AppState, product_id: &str, units: &[&str]) -> Vec<String> {
    use toko_server::db::repository::stock;
    let mut ids = Vec::with_capacity(units.len());
    for unit in units {
        let id = new_id();
        let encrypted = state.content_key.encrypt_string(unit).expect("encrypt");
        stock::add(&state.pool, &id, product_id, &encrypted, now_millis())
            .await
            .expect("insert stock");
        ids.push(id);
    }
    ids
}

/// Create a PENDING order
pub async fn seed_order(
    pool: &SqlitePool,
    product_id: &str,
    quantity: i64,
    amount_due: i64,
    gateway: &str,
    contact: Option<&str>,
) -> String {
    let id = new_id();
    orders::create(
        pool,
        orders::NewOrder {
            id: &id,
            product_id,
            quantity,
            amount_due,
            payment_gateway: gateway,
            customer_contact: contact,
        },
        now_millis(),
    )
    .await
    .expect("insert order");
    id
}

/// Unwrap the business-rule code out of a service error
pub fn error_code<T: std::fmt::Debug>(
    result: Result<T, toko_server::ServiceError>,
) -> toko_server::ErrorCode {
    match result {
        Err(toko_server::ServiceError::App(e)) => e.code,
        other => panic!("expected a business-rule error, got {other:?}"),
    }
}

/// A provider-confirmed payment of the given gross amount
pub fn paid(amount_idr: i64) -> (NormalizedStatus, PaymentDetails) {
    (
        NormalizedStatus::Paid { amount_idr },
        PaymentDetails {
            provider: Some("qris".into()),
            reference: Some("prov-ref-1".into()),
            method: Some("qris".into()),
            paid_time: Some("2025-08-15 10:00:00".into()),
        },
    )
}
