//! Storefront server configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Runtime configuration, loaded once at startup
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// HTTP bind address
    pub bind_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// SQLite database file path
    pub database_path: String,
    /// Directory for rolling log files; stdout only when unset
    pub log_dir: Option<String>,
    /// AES-256 content key, hex encoded (64 chars)
    pub content_key_hex: String,
    /// Shared secret for the admin API (X-Admin-Key header)
    pub admin_api_key: String,
    /// Midtrans server key; gateway disabled when unset
    pub midtrans_server_key: Option<String>,
    pub midtrans_base_url: String,
    /// Tripay API key + private key; gateway disabled unless both set
    pub tripay_api_key: Option<String>,
    pub tripay_private_key: Option<String>,
    pub tripay_merchant_code: String,
    pub tripay_base_url: String,
    /// Saweria stream key; gateway disabled when unset
    pub saweria_stream_key: Option<String>,
    pub saweria_account_id: String,
    pub saweria_base_url: String,
    /// SES sender address; required outside development, the noop
    /// mailer is used when absent in development
    pub ses_from_email: Option<String>,
    /// Public origin used in customer-facing links
    pub public_base_url: String,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let content_key_hex = match std::env::var("CONTENT_KEY") {
            Ok(v) if !v.is_empty() => v,
            _ if environment != "development" => {
                return Err(format!("CONTENT_KEY must be set in {environment} environment").into());
            }
            // Deterministic all-zero key, development only
            _ => "00".repeat(32),
        };

        let ses_from_email = std::env::var("SES_FROM_EMAIL").ok().filter(|s| !s.is_empty());
        if ses_from_email.is_none() && environment != "development" {
            return Err(format!("SES_FROM_EMAIL must be set in {environment} environment").into());
        }

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/toko.db".into()),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            content_key_hex,
            admin_api_key: Self::require_secret("ADMIN_API_KEY", &environment)?,
            midtrans_server_key: std::env::var("MIDTRANS_SERVER_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            midtrans_base_url: std::env::var("MIDTRANS_BASE_URL")
                .unwrap_or_else(|_| "https://api.midtrans.com".into()),
            tripay_api_key: std::env::var("TRIPAY_API_KEY").ok().filter(|s| !s.is_empty()),
            tripay_private_key: std::env::var("TRIPAY_PRIVATE_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            tripay_merchant_code: std::env::var("TRIPAY_MERCHANT_CODE")
                .unwrap_or_else(|_| "T0000".into()),
            tripay_base_url: std::env::var("TRIPAY_BASE_URL")
                .unwrap_or_else(|_| "https://tripay.co.id/api".into()),
            saweria_stream_key: std::env::var("SAWERIA_STREAM_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
            saweria_account_id: std::env::var("SAWERIA_ACCOUNT_ID")
                .unwrap_or_else(|_| "tokodigital".into()),
            saweria_base_url: std::env::var("SAWERIA_BASE_URL")
                .unwrap_or_else(|_| "https://saweria.co".into()),
            ses_from_email,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "https://tokodigital.id".into()),
            environment,
        })
    }
}
