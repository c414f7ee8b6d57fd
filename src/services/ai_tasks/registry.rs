use std::{collections::HashMap, sync::Arc};

use reqwest::Client;
use tokio::sync::RwLock;

use crate::{
    config::AiConfig,
    error::{AppError, GuardReason, Result},
    infrastructure::{
        cache::Cache,
        db::{Database, entities::ai_provider, repositories::AiProviderRepository},
    },
    services::ai_tasks::{http::HttpGenerationProvider, provider::GenerationProvider},
};

/// A provider's configuration row together with the client that speaks to it.
#[derive(Clone)]
pub struct ResolvedProvider {
    pub config: Arc<ai_provider::Model>,
    pub client: Arc<dyn GenerationProvider>,
}

/// Looks up provider rows (through the local cache) and pairs them with a client.
pub struct ProviderRegistry {
    http: Arc<dyn GenerationProvider>,
    overrides: RwLock<HashMap<String, Arc<dyn GenerationProvider>>>,
}

impl ProviderRegistry {
    pub fn new(ai_config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(ai_config.request_timeout)
            .build()?;

        Ok(Self {
            http: Arc::new(HttpGenerationProvider::new(client)),
            overrides: RwLock::new(HashMap::new()),
        })
    }

    /// Routes the provider named `name` to `client` instead of HTTP.
    pub async fn register(&self, name: &str, client: Arc<dyn GenerationProvider>) {
        self.overrides.write().await.insert(name.to_string(), client);
    }

    pub async fn config(
        &self,
        db: &Database,
        cache: &Cache,
        provider_id: i32,
    ) -> Result<Arc<ai_provider::Model>> {
        if let Some(provider) = cache.local.get_provider(provider_id).await {
            return Ok(provider);
        }

        let provider = AiProviderRepository::find_by_id(db.get_connection(), provider_id)
            .await?
            .ok_or(AppError::ProviderNotFound)?;

        Ok(cache.local.set_provider(provider).await)
    }

    /// Resolves an active provider. Inactive providers accept no new work.
    pub async fn resolve(
        &self,
        db: &Database,
        cache: &Cache,
        provider_id: i32,
    ) -> Result<ResolvedProvider> {
        let config = self.config(db, cache, provider_id).await?;
        if !config.is_active {
            return Err(AppError::GuardFailed(GuardReason::ProviderInactive));
        }

        Ok(self.pair(config).await)
    }

    /// Pairs a row with its client without the activity check.
    pub async fn pair(&self, config: Arc<ai_provider::Model>) -> ResolvedProvider {
        let client = self
            .overrides
            .read()
            .await
            .get(&config.name)
            .cloned()
            .unwrap_or_else(|| self.http.clone());

        ResolvedProvider { config, client }
    }
}
