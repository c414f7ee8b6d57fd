use tokio::{signal, sync::watch};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Result;

const DEFAULT_FILTER: &str = "info,fulfillment=debug,tower_http=info,hyper=warn,sea_orm=warn";

/// JSON logs by default; `LOG_FORMAT=pretty` for a human-readable console.
pub fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("pretty"));

    let registry = tracing_subscriber::registry().with(env_filter);

    if pretty {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM and tells background workers to stop.
pub async fn shutdown_signal(workers: watch::Sender<bool>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install ctrl+c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let source = tokio::select! {
        _ = ctrl_c => "ctrl_c",
        _ = terminate => "sigterm",
    };

    tracing::warn!(source, "Shutdown requested, draining requests");

    if workers.send(true).is_err() {
        tracing::debug!("No background workers to stop");
    }
}
