//! Application state for the storefront server

use aws_sdk_sesv2::Client as SesClient;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::cache::ListingCache;
use crate::core::config::Config;
use crate::crypto::ContentKey;
use crate::db::DbService;
use crate::email::{Mailer, NoopMailer, SesMailer};
use crate::gateway::PaymentHub;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// Stock payload encryption key
    pub content_key: ContentKey,
    /// Configured payment gateways
    pub payments: PaymentHub,
    /// Outbound mailer (SES, or the noop mailer in development)
    pub mailer: Arc<dyn Mailer>,
    /// Rendered product listing cache
    pub listing_cache: Arc<ListingCache>,
    /// Admin API shared secret (X-Admin-Key)
    pub admin_api_key: String,
    /// Public origin for customer-facing links
    pub public_base_url: String,
}

impl AppState {
    /// Create a new AppState
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let db = DbService::new(&config.database_path).await?;

        let content_key = ContentKey::from_hex(&config.content_key_hex)?;
        if config.content_key_hex == "00".repeat(32) {
            tracing::warn!("CONTENT_KEY not set, using the all-zero development key");
        }

        let payments = PaymentHub::new(config)?;
        let mailer = build_mailer(config).await;

        Ok(Self {
            pool: db.pool,
            content_key,
            payments,
            mailer,
            listing_cache: Arc::new(ListingCache::default()),
            admin_api_key: config.admin_api_key.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Assemble a state from parts. Tests and local tooling use this
    /// to swap in in-memory pools, mocked mailers and disabled
    /// gateways.
    pub fn from_parts(
        pool: SqlitePool,
        content_key: ContentKey,
        payments: PaymentHub,
        mailer: Arc<dyn Mailer>,
        admin_api_key: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            content_key,
            payments,
            mailer,
            listing_cache: Arc::new(ListingCache::default()),
            admin_api_key: admin_api_key.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

async fn build_mailer(config: &Config) -> Arc<dyn Mailer> {
    let Some(from) = config.ses_from_email.clone() else {
        tracing::warn!("SES_FROM_EMAIL not set, order receipts disabled");
        return Arc::new(NoopMailer);
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ses = if let Ok(ses_region) = std::env::var("SES_REGION") {
        let ses_config = aws_config
            .to_builder()
            .region(aws_config::Region::new(ses_region))
            .build();
        SesClient::new(&ses_config)
    } else {
        SesClient::new(&aws_config)
    };

    Arc::new(SesMailer::new(ses, from))
}
