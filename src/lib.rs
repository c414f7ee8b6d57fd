pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod middleware;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderName, Method, header},
    routing::get,
};
use serde_json::{Value, json};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    error::Result,
    infrastructure::{cache::Cache, db::Database},
    services::{
        ai_tasks::registry::ProviderRegistry,
        clock::{Clock, SystemClock},
        events::EventBus,
        printer::client::{HttpPrinterClient, PrinterClient},
        selection::token::SelectionTokenService,
    },
};

/// Everything the fulfillment core needs, injected once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub cache: Arc<Cache>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<EventBus>,
    pub providers: Arc<ProviderRegistry>,
    pub printer: Arc<dyn PrinterClient>,
    pub tokens: Arc<SelectionTokenService>,
}

impl AppState {
    /// Production wiring: system clock and HTTP clients.
    pub fn assemble(config: Config, db: Database, cache: Cache) -> Result<Self> {
        let providers = ProviderRegistry::new(&config.ai)?;
        let printer = HttpPrinterClient::new()?;
        let tokens = SelectionTokenService::new(&config.selection);

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            cache: Arc::new(cache),
            clock: Arc::new(SystemClock),
            events: Arc::new(EventBus::new()),
            providers: Arc::new(providers),
            printer: Arc::new(printer),
            tokens: Arc::new(tokens),
        })
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .server
                .cors_allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(middleware::logging::INTERNAL_KEY_HEADER),
            HeaderName::from_static(middleware::logging::SIGNATURE_HEADER),
        ]);

    Router::new()
        .route("/health", get(health))
        .nest("/api", api::router())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::logging::make_log_span)
                .on_request(())
                .on_eos(()),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(ConcurrencyLimitLayer::new(
            state.config.server.max_concurrent_requests,
        ))
        .with_state(state)
}
