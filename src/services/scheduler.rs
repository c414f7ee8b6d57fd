use std::future::Future;

use serde::Serialize;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    AppState,
    error::Result,
    services::{
        ai_tasks::{self, types::TickReport},
        orders::{self, ExpireReport},
        printer::{self, RetryReport},
    },
};

pub const AI_POLL: &str = "ai_poll";
pub const PRINTER_RETRY: &str = "printer_retry";
pub const ORDER_EXPIRY: &str = "order_expiry";

/// What one pass did per concern. `None` means another worker held the lease
/// or the concern failed.
#[derive(Debug, Default, Clone, Serialize)]
pub struct PassReport {
    pub ai: Option<TickReport>,
    pub printer: Option<RetryReport>,
    pub expiry: Option<ExpireReport>,
}

/// Runs `work` only if this worker wins the concern's lease.
async fn leased<T, F, Fut>(state: &AppState, concern: &str, owner: &str, work: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match state.cache.try_acquire_lease(concern, owner).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::debug!(concern, "Lease held elsewhere, skipping");
            return None;
        }
        Err(err) => {
            tracing::warn!(concern, error = %err, "Lease acquisition failed");
            return None;
        }
    }

    let outcome = work().await;

    if let Err(err) = state.cache.release_lease(concern, owner).await {
        tracing::warn!(concern, error = %err, "Lease release failed");
    }

    match outcome {
        Ok(report) => Some(report),
        Err(err) => {
            tracing::error!(concern, error = %err, "Scheduler concern failed");
            None
        }
    }
}

/// One pass over every periodic concern.
pub async fn run_once(state: &AppState, owner: &str) -> PassReport {
    PassReport {
        ai: leased(state, AI_POLL, owner, || ai_tasks::tick(state)).await,
        printer: leased(state, PRINTER_RETRY, owner, || printer::retry_tick(state)).await,
        expiry: leased(state, ORDER_EXPIRY, owner, || orders::expire_tick(state)).await,
    }
}

/// Drives `run_once` on the configured interval until `shutdown` flips.
pub fn spawn(state: AppState, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let owner = format!("scheduler-{}", uuid::Uuid::new_v4());
    let period = state.config.scheduler.interval;

    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(period);
        interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(owner = %owner, interval_secs = period.as_secs(), "Scheduler started");

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    let report = run_once(&state, &owner).await;
                    tracing::debug!(report = ?report, "Scheduler pass finished");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(owner = %owner, "Scheduler stopped");
    })
}
