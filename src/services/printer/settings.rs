use std::{collections::HashMap, sync::Arc, time::Duration};

use crate::{
    AppState,
    config::PrinterConfig,
    error::Result,
    infrastructure::{cache::keys::CacheKey, db::repositories::SystemConfigRepository},
};

const PREFIX: &str = "printer.";

/// Print-house settings: environment defaults overlaid with `printer.*`
/// rows from the system config table.
#[derive(Debug, Clone)]
pub struct PrinterSettings {
    pub api_url: String,
    pub cancel_url: String,
    pub source_app_id: String,
    pub shop_id: String,
    pub shop_name: String,
    pub default_product_id: String,
    pub media_base_url: String,
    pub signing_secret: Option<String>,
    pub callback_secret: String,
    pub request_timeout: Duration,
    pub max_attempts: i32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
}

impl PrinterSettings {
    pub fn from_config(config: &PrinterConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            cancel_url: config.cancel_url.clone(),
            source_app_id: config.source_app_id.clone(),
            shop_id: config.default_shop_id.clone(),
            shop_name: config.default_shop_name.clone(),
            default_product_id: config.default_product_id.clone(),
            media_base_url: config.media_base_url.clone(),
            signing_secret: config.signing_secret.clone(),
            callback_secret: config.callback_secret.clone(),
            request_timeout: config.request_timeout,
            max_attempts: config.max_attempts,
            retry_base: config.retry_base,
            retry_cap: config.retry_cap,
        }
    }

    /// Applies stored overrides. Unknown keys and unparsable numbers are ignored.
    pub fn overlay(mut self, stored: &HashMap<String, String>) -> Self {
        for (key, value) in stored {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.trim_start_matches(PREFIX) {
                "api_url" => self.api_url = value.to_string(),
                "cancel_url" => self.cancel_url = value.to_string(),
                "source_app_id" => self.source_app_id = value.to_string(),
                "shop_id" => self.shop_id = value.to_string(),
                "shop_name" => self.shop_name = value.to_string(),
                "default_product_id" => self.default_product_id = value.to_string(),
                "media_base_url" => self.media_base_url = value.to_string(),
                "signing_secret" => self.signing_secret = Some(value.to_string()),
                "callback_secret" => self.callback_secret = value.to_string(),
                "max_attempts" => {
                    if let Ok(parsed) = value.parse::<i32>() {
                        self.max_attempts = parsed.max(1);
                    }
                }
                "timeout_secs" => {
                    if let Ok(parsed) = value.parse::<u64>() {
                        self.request_timeout = Duration::from_secs(parsed);
                    }
                }
                other => tracing::debug!(key = other, "Ignoring unknown printer setting"),
            }
        }
        self
    }

    pub async fn load(state: &AppState) -> Result<Arc<PrinterSettings>> {
        let cache_key = CacheKey::settings(PREFIX);

        let stored = match state.cache.local.get_settings(&cache_key).await {
            Some(stored) => stored,
            None => {
                let rows =
                    SystemConfigRepository::list_prefixed(state.db.get_connection(), PREFIX).await?;
                let stored = rows
                    .into_iter()
                    .map(|row| (row.config_key, row.config_value))
                    .collect::<HashMap<_, _>>();
                state
                    .cache
                    .local
                    .set_settings(cache_key.clone(), stored.clone())
                    .await;
                Arc::new(stored)
            }
        };

        Ok(Arc::new(
            Self::from_config(&state.config.printer).overlay(&stored),
        ))
    }

    pub async fn invalidate(state: &AppState) {
        state
            .cache
            .local
            .invalidate_settings(&CacheKey::settings(PREFIX))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_rows_override_environment() {
        let base = PrinterSettings::from_config(&PrinterConfig::with_callback_secret("s3cret-callback"));
        let stored = HashMap::from([
            ("printer.shop_id".to_string(), "SHOP-9".to_string()),
            ("printer.max_attempts".to_string(), "3".to_string()),
            ("printer.timeout_secs".to_string(), "oops".to_string()),
            ("printer.api_url".to_string(), "  ".to_string()),
        ]);

        let settings = base.clone().overlay(&stored);
        assert_eq!(settings.shop_id, "SHOP-9");
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.request_timeout, base.request_timeout);
        assert_eq!(settings.api_url, base.api_url);
    }
}
