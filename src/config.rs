use rust_decimal::Decimal;
use std::time::Duration;

use crate::utils::RetryConfig;

// ============================================================================
// Service configuration, read from the environment (optionally via `.env`)
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,

    pub store_backend: StoreBackend,
    pub scylla_node: String,
    pub scylla_keyspace: String,

    /// Unset disables signature verification (logged loudly on every delivery)
    pub webhook_secret: Option<String>,
    pub provider_api_url: String,
    pub provider_api_token: String,
    pub provider_shop_id: u64,

    pub admin_api_token: Option<String>,
    pub mockup_wait: Duration,
    pub store_base_url: String,

    pub provider_currency: String,
    pub local_currency: String,
    /// Used when the live rate source is unreachable
    pub fallback_exchange_rate: Option<Decimal>,
    pub exchange_rate_api_url: Option<String>,
    pub exchange_rate_ttl: Duration,

    pub conflict_retry_attempts: u32,
    pub catalog_retry_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store_backend = match get("POD_STORE_BACKEND").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("scylla") => StoreBackend::Scylla,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "POD_STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let scylla_node = get("SCYLLA_NODE").unwrap_or_else(|| "127.0.0.1:9042".to_string());
        let scylla_keyspace = get("SCYLLA_KEYSPACE").unwrap_or_else(|| "pod_fulfillment".to_string());

        Ok(Self {
            bind_addr: get("POD_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&get, "POD_PORT", 8080)?,
            store_backend,
            scylla_node,
            scylla_keyspace,
            webhook_secret: get("PROVIDER_WEBHOOK_SECRET"),
            provider_api_url: get("PROVIDER_API_URL").unwrap_or_else(|| "https://api.printify.com".to_string()),
            provider_api_token: get("PROVIDER_API_TOKEN").unwrap_or_default(),
            provider_shop_id: parse(&get, "PROVIDER_SHOP_ID", 0)?,
            admin_api_token: get("ADMIN_API_TOKEN"),
            mockup_wait: Duration::from_secs(parse(&get, "MOCKUP_WAIT_SECS", 10)?),
            store_base_url: get("STORE_BASE_URL").unwrap_or_else(|| "http://localhost:3000".to_string()),
            provider_currency: get("PROVIDER_CURRENCY").unwrap_or_else(|| "USD".to_string()).to_uppercase(),
            local_currency: get("LOCAL_CURRENCY").unwrap_or_else(|| "INR".to_string()).to_uppercase(),
            fallback_exchange_rate: optional(&get, "FALLBACK_EXCHANGE_RATE")?,
            exchange_rate_api_url: get("EXCHANGE_RATE_API_URL"),
            exchange_rate_ttl: Duration::from_secs(parse(&get, "EXCHANGE_RATE_TTL_SECS", 3600)?),
            conflict_retry_attempts: parse(&get, "ORDER_CONFLICT_RETRIES", 8)?,
            catalog_retry_attempts: parse(&get, "CATALOG_WRITE_RETRIES", 5)?,
        })
    }

    pub fn conflict_retry(&self) -> RetryConfig {
        RetryConfig::conditional_writes().with_max_attempts(self.conflict_retry_attempts)
    }

    pub fn catalog_retry(&self) -> RetryConfig {
        RetryConfig::catalog_writes().with_max_attempts(self.catalog_retry_attempts)
    }
}

fn optional<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(name)
        .map(|value| value.parse().map_err(|_| ConfigError::Invalid { name, value }))
        .transpose()
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    Ok(optional(get, name)?.unwrap_or(default))
}
