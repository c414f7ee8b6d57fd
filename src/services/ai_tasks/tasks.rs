use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        entities::{
            ai_provider,
            ai_task::{self, AiTaskStatus},
            order::OrderStatus,
        },
        repositories::{AiTaskRepository, OrderRepository},
    },
    services::ai_tasks::{
        fan_in::fan_in,
        provider::{PollOutcome, ProviderReply, SubmitOutcome},
        registry::ResolvedProvider,
        types::{NewTask, TickReport},
    },
    utils::{backoff, security::verify_signature},
};

pub async fn find_task(state: &AppState, task_id: Uuid) -> Result<ai_task::Model> {
    AiTaskRepository::find_by_id(state.db.get_connection(), task_id)
        .await?
        .ok_or(AppError::TaskNotFound)
}

pub async fn create_task(state: &AppState, new_task: NewTask) -> Result<ai_task::Model> {
    if new_task.input_image_path.trim().is_empty() {
        return Err(AppError::InvalidParams(
            "input_image_path must not be empty".into(),
        ));
    }

    state
        .providers
        .config(&state.db, &state.cache, new_task.provider_id)
        .await?;

    if let Some(order_id) = new_task.order_id {
        OrderRepository::find_by_id(state.db.get_connection(), order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
    }

    let task = AiTaskRepository::create(
        state.db.get_connection(),
        new_task.order_id,
        new_task.provider_id,
        &new_task.input_image_path,
        &new_task.prompt,
        new_task.params.unwrap_or_else(|| serde_json::json!({})),
        new_task.style_category_id,
        new_task.style_image_id,
        state.clock.now(),
    )
    .await?;

    tracing::info!(
        task_id = %task.id,
        order_id = ?task.order_id,
        provider_id = task.provider_id,
        "AI task created"
    );

    Ok(task)
}

fn poll_window(config: &ai_provider::Model) -> (Duration, Duration) {
    let base = Duration::from_secs(config.poll_base_secs.max(1) as u64);
    let cap = Duration::from_secs(config.poll_cap_secs.max(config.poll_base_secs).max(1) as u64);
    (base, cap)
}

fn task_timeout(config: &ai_provider::Model) -> Duration {
    Duration::from_secs(config.task_timeout_secs.max(1) as u64)
}

fn mark_failed(active: &mut ai_task::ActiveModel, message: String, now: DateTime<Utc>) {
    active.status = Set(AiTaskStatus::Failed);
    active.last_error = Set(Some(message));
    active.finished_at = Set(Some(now));
    active.next_attempt_at = Set(None);
}

fn mark_completed(
    active: &mut ai_task::ActiveModel,
    current: &ai_task::Model,
    result_url: String,
    now: DateTime<Utc>,
) {
    active.status = Set(AiTaskStatus::Completed);
    active.result_image_path = Set(Some(result_url));
    active.submitted_at = Set(Some(current.submitted_at.unwrap_or(now)));
    active.finished_at = Set(Some(now));
    active.last_error = Set(None);
    active.next_attempt_at = Set(None);
}

fn in_flight(task: &ai_task::Model) -> Result<()> {
    if task.status.is_in_flight() && !task.cancel_requested && task.superseded_by.is_none() {
        Ok(())
    } else {
        Err(AppError::GuardFailed(GuardReason::TaskNotSubmittable))
    }
}

/// Takes the task for one provider call. The bumped version doubles as the
/// claim: a later settle only applies if nobody wrote the task in between.
async fn claim<V, F>(
    state: &AppState,
    task_id: Uuid,
    validate: V,
    updater: F,
) -> Result<ai_task::Model>
where
    V: FnOnce(&ai_task::Model) -> Result<()> + Send,
    F: FnOnce(&ai_task::Model, &mut ai_task::ActiveModel) + Send,
{
    let uow = state.db.unit_of_work().await?;
    let task = uow.task_for_update(task_id).await?;

    if let Err(err) = validate(&task) {
        uow.rollback().await?;
        return Err(err);
    }

    let lease = backoff::to_chrono(state.config.ai.request_timeout);
    let mut active: ai_task::ActiveModel = task.clone().into();
    active.next_attempt_at = Set(Some(state.clock.now() + lease));
    updater(&task, &mut active);

    let claimed = AiTaskRepository::save(uow.connection(), &task, active).await?;
    uow.commit().await?;

    Ok(claimed)
}

/// Applies a provider result to the claimed task; `None` when the claim was lost.
async fn settle<F>(
    state: &AppState,
    claimed: &ai_task::Model,
    updater: F,
) -> Result<Option<ai_task::Model>>
where
    F: FnOnce(&ai_task::Model, &mut ai_task::ActiveModel) + Send,
{
    let uow = state.db.unit_of_work().await?;
    let current = uow.task_for_update(claimed.id).await?;

    if current.version != claimed.version {
        uow.rollback().await?;
        tracing::info!(
            task_id = %claimed.id,
            status = current.status.as_str(),
            "Task changed during the provider call, dropping result"
        );
        return Ok(None);
    }

    let mut active: ai_task::ActiveModel = current.clone().into();
    updater(&current, &mut active);

    let saved = AiTaskRepository::save(uow.connection(), &current, active).await?;
    uow.commit().await?;

    Ok(Some(saved))
}

async fn apply_submission(
    state: &AppState,
    claimed: &ai_task::Model,
    provider: &ResolvedProvider,
    outcome: Result<SubmitOutcome>,
) -> Result<ai_task::Model> {
    let now = state.clock.now();
    let config = provider.config.clone();
    let (base, cap) = poll_window(&config);
    let orphaned_job = match &outcome {
        Ok(SubmitOutcome::Accepted { job_id }) => Some(job_id.clone()),
        _ => None,
    };

    match &outcome {
        Ok(_) => tracing::info!(task_id = %claimed.id, provider = %config.name, "Task submitted"),
        Err(err) => tracing::warn!(
            task_id = %claimed.id,
            provider = %config.name,
            attempt = claimed.attempt_count,
            error = %err,
            "Task submission failed"
        ),
    }

    let settled = settle(state, claimed, move |current, active| match outcome {
        Ok(SubmitOutcome::Completed { result_url }) => {
            mark_completed(active, current, result_url, now);
        }
        Ok(SubmitOutcome::Accepted { job_id }) => {
            if current.status == AiTaskStatus::Submitting {
                active.status = Set(AiTaskStatus::Submitted);
            }
            active.provider_job_id = Set(Some(job_id));
            active.submitted_at = Set(Some(now));
            active.last_error = Set(None);
            active.next_attempt_at =
                Set(Some(now + backoff::to_chrono(backoff::delay(base, cap, 0))));
        }
        Err(err) => {
            active.provider_job_id = Set(None);
            if current.attempt_count >= config.max_retries {
                mark_failed(active, err.to_string(), now);
            } else {
                let exponent = current.attempt_count.max(1) as u32 - 1;
                if current.status == AiTaskStatus::Submitting {
                    active.status = Set(AiTaskStatus::Pending);
                }
                active.last_error = Set(Some(err.to_string()));
                active.next_attempt_at =
                    Set(Some(now + backoff::to_chrono(backoff::delay(base, cap, exponent))));
            }
        }
    })
    .await?;

    match settled {
        Some(task) => Ok(task),
        None => {
            if let Some(job_id) = orphaned_job {
                if let Err(err) = provider
                    .client
                    .cancel(&provider.config, claimed, &job_id)
                    .await
                {
                    tracing::warn!(task_id = %claimed.id, error = %err, "Orphaned job cancel failed");
                }
            }
            find_task(state, claimed.id).await
        }
    }
}

async fn apply_poll(
    state: &AppState,
    claimed: &ai_task::Model,
    provider: &ResolvedProvider,
    outcome: Result<PollOutcome>,
) -> Result<ai_task::Model> {
    let now = state.clock.now();
    let config = provider.config.clone();
    let (base, cap) = poll_window(&config);
    let timeout = task_timeout(&config);
    let submitted_at = claimed.submitted_at.unwrap_or(claimed.created_at);
    let elapsed = (now - submitted_at).to_std().unwrap_or_default();
    let task_id = claimed.id;

    let settled = settle(state, claimed, move |current, active| {
        active.status = Set(AiTaskStatus::Polling);
        active.polled_at = Set(Some(now));

        let next_poll = now
            + backoff::to_chrono(backoff::delay(
                base,
                cap,
                backoff::exponent_for_elapsed(base, elapsed),
            ));

        match outcome {
            Ok(PollOutcome::Running) if elapsed >= timeout => {
                mark_failed(active, "timed out waiting for the provider".into(), now);
            }
            Ok(PollOutcome::Running) => {
                active.next_attempt_at = Set(Some(next_poll));
            }
            Ok(PollOutcome::Completed { result_url }) => {
                mark_completed(active, current, result_url, now);
            }
            Ok(PollOutcome::Failed { message }) => {
                tracing::warn!(task_id = %task_id, error = %message, "Provider reported job failure");
                if current.attempt_count >= config.max_retries {
                    mark_failed(active, message, now);
                } else {
                    // Resubmitted right after this write.
                    active.provider_job_id = Set(None);
                    active.last_error = Set(Some(message));
                    active.next_attempt_at = Set(Some(now));
                }
            }
            Err(err) if elapsed >= timeout => {
                mark_failed(active, format!("timed out: {err}"), now);
            }
            Err(err) => {
                tracing::warn!(task_id = %task_id, error = %err, "Poll failed, will retry");
                active.last_error = Set(Some(err.to_string()));
                active.next_attempt_at = Set(Some(next_poll));
            }
        }
    })
    .await?;

    match settled {
        Some(task) => Ok(task),
        None => find_task(state, task_id).await,
    }
}

/// A pending task, or one whose earlier submit claim was abandoned.
fn submittable(task: &ai_task::Model, now: DateTime<Utc>) -> Result<()> {
    let open = match task.status {
        AiTaskStatus::Pending => true,
        AiTaskStatus::Submitting => task.next_attempt_at.is_some_and(|at| at <= now),
        _ => false,
    };

    if open && !task.cancel_requested && task.superseded_by.is_none() {
        Ok(())
    } else {
        Err(AppError::GuardFailed(GuardReason::TaskNotSubmittable))
    }
}

fn awaiting_resubmit(task: &ai_task::Model) -> bool {
    task.status == AiTaskStatus::Polling
        && task.provider_job_id.is_none()
        && !task.cancel_requested
        && task.superseded_by.is_none()
}

/// Sends an in-flight task whose job was lost or failed to the provider again.
async fn resubmit_in_place(
    state: &AppState,
    task_id: Uuid,
    provider: &ResolvedProvider,
) -> Result<ai_task::Model> {
    let claimed = claim(state, task_id, in_flight, |task, active| {
        active.attempt_count = Set(task.attempt_count + 1);
    })
    .await?;

    let outcome = provider.client.submit(&provider.config, &claimed).await;
    apply_submission(state, &claimed, provider, outcome).await
}

async fn after_settle(state: &AppState, task: &ai_task::Model) {
    if !task.status.is_terminal() {
        return;
    }

    if let Some(order_id) = task.order_id {
        if let Err(err) = fan_in(state, order_id).await {
            tracing::warn!(order_id, task_id = %task.id, error = %err, "Fan-in failed");
        }
    }
}

/// Hands a pending task to its provider.
pub async fn submit(state: &AppState, task_id: Uuid) -> Result<ai_task::Model> {
    let task = find_task(state, task_id).await?;
    let provider = state
        .providers
        .resolve(&state.db, &state.cache, task.provider_id)
        .await?;

    let now = state.clock.now();
    let claimed = claim(
        state,
        task_id,
        |task| submittable(task, now),
        |task, active| {
            active.status = Set(AiTaskStatus::Submitting);
            active.attempt_count = Set(task.attempt_count + 1);
        },
    )
    .await?;

    let outcome = provider.client.submit(&provider.config, &claimed).await;
    let task = apply_submission(state, &claimed, &provider, outcome).await?;

    after_settle(state, &task).await;

    Ok(task)
}

/// Asks the provider how an in-flight task is doing.
pub async fn poll(state: &AppState, task_id: Uuid) -> Result<ai_task::Model> {
    let task = find_task(state, task_id).await?;
    if in_flight(&task).is_err() {
        return Ok(task);
    }

    let config = state
        .providers
        .config(&state.db, &state.cache, task.provider_id)
        .await?;
    let provider = state.providers.pair(config).await;

    let mut task = match task.provider_job_id.clone() {
        None => resubmit_in_place(state, task_id, &provider).await?,
        Some(job_id) => {
            let claimed = claim(state, task_id, in_flight, |_, _| {}).await?;
            let outcome = provider
                .client
                .poll(&provider.config, &claimed, &job_id)
                .await;
            apply_poll(state, &claimed, &provider, outcome).await?
        }
    };

    if awaiting_resubmit(&task) && task.next_attempt_at.is_some_and(|at| at <= state.clock.now())
    {
        task = resubmit_in_place(state, task_id, &provider).await?;
    }

    after_settle(state, &task).await;

    Ok(task)
}

/// Result pushed by the provider to the callback route.
pub async fn provider_reply(
    state: &AppState,
    provider_id: i32,
    body: &[u8],
    signature: Option<&str>,
) -> Result<ai_task::Model> {
    let config = state
        .providers
        .config(&state.db, &state.cache, provider_id)
        .await?;
    let secret = config
        .callback_secret
        .as_deref()
        .ok_or(AppError::InvalidSignature)?;
    verify_signature(secret, body, signature)?;

    let reply: ProviderReply = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidParams(format!("Malformed provider reply: {e}")))?;

    let task = find_task(state, reply.task_id).await?;
    if task.provider_id != provider_id {
        return Err(AppError::InvalidParams(
            "task belongs to another provider".into(),
        ));
    }

    if in_flight(&task).is_err() {
        tracing::debug!(task_id = %task.id, status = task.status.as_str(), "Ignoring late provider reply");
        return Ok(task);
    }

    let provider = state.providers.pair(config).await;
    let claimed = claim(state, task.id, in_flight, |_, _| {}).await?;
    let mut task = apply_poll(state, &claimed, &provider, Ok(reply.outcome())).await?;

    if awaiting_resubmit(&task) {
        task = resubmit_in_place(state, task.id, &provider).await?;
    }

    after_settle(state, &task).await;

    Ok(task)
}

/// Cancels a task: flag first, best-effort provider cancel, then the terminal write.
pub async fn cancel(state: &AppState, task_id: Uuid, actor: &str) -> Result<ai_task::Model> {
    let task = find_task(state, task_id).await?;
    if task.status.is_terminal() {
        return Ok(task);
    }

    let uow = state.db.unit_of_work().await?;
    let current = uow.task_for_update(task_id).await?;
    if current.status.is_terminal() {
        uow.rollback().await?;
        return Ok(current);
    }
    let mut active: ai_task::ActiveModel = current.clone().into();
    active.cancel_requested = Set(true);
    let flagged = AiTaskRepository::save(uow.connection(), &current, active).await?;
    uow.commit().await?;

    if let Some(job_id) = flagged.provider_job_id.as_deref() {
        match state
            .providers
            .config(&state.db, &state.cache, flagged.provider_id)
            .await
        {
            Ok(config) => {
                let provider = state.providers.pair(config).await;
                if let Err(err) = provider.client.cancel(&provider.config, &flagged, job_id).await {
                    tracing::warn!(task_id = %task_id, error = %err, "Provider cancel failed");
                }
            }
            Err(err) => tracing::warn!(task_id = %task_id, error = %err, "Provider lookup failed"),
        }
    }

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let current = uow.task_for_update(task_id).await?;
    if current.status.is_terminal() {
        uow.rollback().await?;
        return Ok(current);
    }
    let mut active: ai_task::ActiveModel = current.clone().into();
    active.status = Set(AiTaskStatus::Cancelled);
    active.finished_at = Set(Some(now));
    active.next_attempt_at = Set(None);
    let cancelled = AiTaskRepository::save(uow.connection(), &current, active).await?;
    uow.commit().await?;

    tracing::info!(task_id = %task_id, actor, "AI task cancelled");

    after_settle(state, &cancelled).await;

    Ok(cancelled)
}

pub async fn cancel_for_order(state: &AppState, order_id: i32, actor: &str) -> Result<()> {
    let tasks = AiTaskRepository::list_active_for_order(state.db.get_connection(), order_id).await?;

    for task in tasks.into_iter().filter(|task| !task.status.is_terminal()) {
        if let Err(err) = cancel(state, task.id, actor).await {
            tracing::warn!(order_id, task_id = %task.id, error = %err, "Task cancel failed");
        }
    }

    Ok(())
}

/// Replaces a failed task with a fresh one carrying the same inputs.
pub async fn resubmit(state: &AppState, task_id: Uuid, actor: &str) -> Result<ai_task::Model> {
    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let old = uow.task_for_update(task_id).await?;

    if old.status != AiTaskStatus::Failed || old.superseded_by.is_some() {
        uow.rollback().await?;
        return Err(AppError::GuardFailed(GuardReason::TaskNotFailed));
    }

    let replacement = AiTaskRepository::create(
        uow.connection(),
        old.order_id,
        old.provider_id,
        &old.input_image_path,
        &old.prompt,
        old.params.clone(),
        old.style_category_id,
        old.style_image_id,
        now,
    )
    .await?;

    let mut active: ai_task::ActiveModel = old.clone().into();
    active.superseded_by = Set(Some(replacement.id));
    AiTaskRepository::save(uow.connection(), &old, active).await?;
    uow.commit().await?;

    tracing::info!(
        task_id = %task_id,
        replacement_id = %replacement.id,
        actor,
        "AI task resubmitted"
    );

    let Some(order_id) = replacement.order_id else {
        return Ok(replacement);
    };

    let in_progress = match OrderRepository::find_by_id(state.db.get_connection(), order_id).await? {
        Some(order) => order.order_status()? == OrderStatus::AiProcessing,
        None => false,
    };

    let task = if in_progress {
        match submit(state, replacement.id).await {
            Ok(task) => task,
            Err(err) => {
                tracing::warn!(task_id = %replacement.id, error = %err, "Replacement submit failed");
                find_task(state, replacement.id).await?
            }
        }
    } else {
        replacement
    };

    if let Err(err) = fan_in(state, order_id).await {
        tracing::warn!(order_id, error = %err, "Fan-in failed");
    }

    Ok(task)
}

/// Submits retryable pending tasks and polls in-flight ones that are due.
pub async fn tick(state: &AppState) -> Result<TickReport> {
    let due = AiTaskRepository::list_due(
        state.db.get_connection(),
        state.clock.now(),
        state.config.scheduler.batch_size,
    )
    .await?;

    let mut report = TickReport::default();

    for task in due {
        let result = if matches!(task.status, AiTaskStatus::Pending | AiTaskStatus::Submitting) {
            report.submitted += 1;
            submit(state, task.id).await
        } else {
            report.polled += 1;
            poll(state, task.id).await
        };

        if let Err(err) = result {
            report.errors += 1;
            tracing::warn!(task_id = %task.id, error = %err, "AI tick step failed");
        }
    }

    Ok(report)
}
