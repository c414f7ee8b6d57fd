use std::{env, str::FromStr, time::Duration};

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub selection: SelectionConfig,
    pub scheduler: SchedulerConfig,
    pub printer: PrinterConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_concurrent_requests: usize,
    pub internal_api_key: String,
}

/// Which locking strategy the persistence gateway should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockModeSetting {
    /// Row locks where the backend supports them, version CAS otherwise.
    Auto,
    RowLock,
    VersionCas,
}

impl FromStr for LockModeSetting {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "row_lock" => Ok(Self::RowLock),
            "version_cas" => Ok(Self::VersionCas),
            other => Err(AppError::InvalidParams(format!(
                "Unknown DB_LOCK_MODE '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub lock_mode: LockModeSetting,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub pool_size: usize,
    pub connect_timeout: Duration,
    pub local_max_capacity: u64,
    pub local_config_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            pool_size: 10,
            connect_timeout: Duration::from_secs(10),
            local_max_capacity: 1_000,
            local_config_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub token_secret: String,
    pub view_token_ttl: Duration,
    pub action_token_ttl: Duration,
    pub confirmation_window: Duration,
    pub default_free_selection_count: i32,
    pub default_extra_photo_price_cents: i64,
}

impl SelectionConfig {
    pub fn with_secret(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            view_token_ttl: Duration::from_secs(3 * 24 * 3600),
            action_token_ttl: Duration::from_secs(2 * 3600),
            confirmation_window: Duration::from_secs(3 * 24 * 3600),
            default_free_selection_count: 1,
            default_extra_photo_price_cents: 1_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub lease_ttl: Duration,
    pub batch_size: u64,
    pub cancel_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            lease_ttl: Duration::from_secs(120),
            batch_size: 50,
            cancel_timeout: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub api_url: String,
    pub cancel_url: String,
    pub source_app_id: String,
    pub default_shop_id: String,
    pub default_shop_name: String,
    pub default_product_id: String,
    pub media_base_url: String,
    pub signing_secret: Option<String>,
    pub callback_secret: String,
    pub request_timeout: Duration,
    pub max_attempts: i32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
}

impl PrinterConfig {
    pub fn with_callback_secret(callback_secret: impl Into<String>) -> Self {
        Self {
            api_url: "http://127.0.0.1:9000/api/orders".to_string(),
            cancel_url: "http://127.0.0.1:9000/api/orders/cancel".to_string(),
            source_app_id: "petstudio".to_string(),
            default_shop_id: "SHOP001".to_string(),
            default_shop_name: "Pet Studio".to_string(),
            default_product_id: "P001".to_string(),
            media_base_url: "http://127.0.0.1:8080".to_string(),
            signing_secret: None,
            callback_secret: callback_secret.into(),
            request_timeout: Duration::from_secs(30),
            max_attempts: 5,
            retry_base: Duration::from_secs(60),
            retry_cap: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub request_timeout: Duration,
    pub provider_cache_ttl: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            provider_cache_ttl: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                host: env_or_default("HOST", "127.0.0.1"),
                port: env_or_parse("PORT", 8080)?,
                cors_allowed_origins: env_list("CORS_ALLOWED_ORIGINS", vec!["".into()]),
                max_concurrent_requests: env_or_parse("SERVER_MAX_CONCURRENT_REQUESTS", 100)?,
                internal_api_key: env_required("INTERNAL_API_KEY")?,
            },
            database: DatabaseConfig {
                url: env_required("DATABASE_URL")?,
                max_connections: env_or_parse("DB_MAX_CONNECTIONS", 10)?,
                min_connections: env_or_parse("DB_MIN_CONNECTIONS", 2)?,
                connect_timeout: Duration::from_secs(env_or_parse("DB_CONNECT_TIMEOUT_SECS", 10)?),
                idle_timeout: Duration::from_secs(env_or_parse("DB_IDLE_TIMEOUT_SECS", 300)?),
                lock_mode: env_or_parse("DB_LOCK_MODE", LockModeSetting::Auto)?,
            },
            cache: CacheConfig {
                redis_url: env_optional("CACHE_URL"),
                pool_size: env_or_parse("CACHE_POOL_SIZE", 10)?,
                connect_timeout: Duration::from_secs(env_or_parse(
                    "CACHE_CONNECT_TIMEOUT_SECS",
                    10,
                )?),
                local_max_capacity: env_or_parse("CACHE_LOCAL_MAX_CAPACITY", 1_000)?,
                local_config_ttl: Duration::from_secs(env_or_parse(
                    "CACHE_LOCAL_CONFIG_TTL_SECS",
                    60,
                )?),
            },
            selection: SelectionConfig {
                token_secret: env_required("SELECTION_TOKEN_SECRET")?,
                view_token_ttl: Duration::from_secs(
                    env_or_parse("SELECTION_VIEW_TTL_SECS", 259_200)?, // 3 days
                ),
                action_token_ttl: Duration::from_secs(
                    env_or_parse("SELECTION_ACTION_TTL_SECS", 7_200)?, // 2hrs
                ),
                confirmation_window: Duration::from_secs(env_or_parse(
                    "CONFIRMATION_WINDOW_SECS",
                    259_200,
                )?),
                default_free_selection_count: env_or_parse("DEFAULT_FREE_SELECTION_COUNT", 1)?,
                default_extra_photo_price_cents: env_or_parse(
                    "DEFAULT_EXTRA_PHOTO_PRICE_CENTS",
                    1_000,
                )?,
            },
            scheduler: SchedulerConfig {
                enabled: env_or_parse("SCHEDULER_ENABLED", true)?,
                interval: Duration::from_secs(env_or_parse("SCHEDULER_INTERVAL_SECS", 30)?),
                lease_ttl: Duration::from_secs(env_or_parse("SCHEDULER_LEASE_TTL_SECS", 120)?),
                batch_size: env_or_parse("SCHEDULER_BATCH_SIZE", 50)?,
                cancel_timeout: Duration::from_secs(env_or_parse(
                    "CANCEL_REQUEST_TIMEOUT_SECS",
                    86_400,
                )?),
            },
            printer: PrinterConfig {
                api_url: env_required("PRINTER_API_URL")?,
                cancel_url: env_required("PRINTER_CANCEL_URL")?,
                source_app_id: env_required("PRINTER_SOURCE_APP_ID")?,
                default_shop_id: env_required("PRINTER_SHOP_ID")?,
                default_shop_name: env_or_default("PRINTER_SHOP_NAME", "Pet Studio"),
                default_product_id: env_or_default("PRINTER_DEFAULT_PRODUCT_ID", "P001"),
                media_base_url: env_required("MEDIA_BASE_URL")?,
                signing_secret: env_optional("PRINTER_SIGNING_SECRET"),
                callback_secret: env_required("PRINTER_CALLBACK_SECRET")?,
                request_timeout: Duration::from_secs(env_or_parse("PRINTER_TIMEOUT_SECS", 30)?),
                max_attempts: env_or_parse("PRINTER_MAX_ATTEMPTS", 5)?,
                retry_base: Duration::from_secs(env_or_parse("PRINTER_RETRY_BASE_SECS", 60)?),
                retry_cap: Duration::from_secs(env_or_parse("PRINTER_RETRY_CAP_SECS", 3_600)?),
            },
            ai: AiConfig {
                request_timeout: Duration::from_secs(env_or_parse("AI_REQUEST_TIMEOUT_SECS", 120)?),
                provider_cache_ttl: Duration::from_secs(env_or_parse(
                    "AI_PROVIDER_CACHE_TTL_SECS",
                    60,
                )?),
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.selection.token_secret.len() < 32 {
            return Err(AppError::InvalidParams(
                "SELECTION_TOKEN_SECRET must be at least 32 characters".into(),
            ));
        }

        if self.printer.callback_secret.len() < 16 {
            return Err(AppError::InvalidParams(
                "PRINTER_CALLBACK_SECRET must be at least 16 characters".into(),
            ));
        }

        if self.server.internal_api_key.is_empty() {
            return Err(AppError::InvalidParams(
                "INTERNAL_API_KEY must not be empty".into(),
            ));
        }

        if self.printer.max_attempts < 1 {
            return Err(AppError::InvalidParams(
                "PRINTER_MAX_ATTEMPTS must be positive".into(),
            ));
        }

        if self.selection.default_free_selection_count < 0
            || self.selection.default_extra_photo_price_cents < 0
        {
            return Err(AppError::InvalidParams(
                "Selection pricing defaults must not be negative".into(),
            ));
        }

        if self.scheduler.interval.is_zero() {
            return Err(AppError::InvalidParams(
                "SCHEDULER_INTERVAL_SECS must be positive".into(),
            ));
        }

        Ok(())
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|_| AppError::InvalidParams(format!("Invalid value for {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| AppError::InvalidParams(format!("{key} is required")))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn env_list(key: &str, default: Vec<String>) -> Vec<String> {
    env::var(key)
        .map(|val| {
            val.split(',')
                .map(|str_val| str_val.trim().to_string())
                .collect()
        })
        .unwrap_or(default)
}
