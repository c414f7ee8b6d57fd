use chrono::Duration;
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serde_json::json;

use fulfillment::{
    error::{AppError, GuardReason},
    infrastructure::db::{
        entities::{
            ai_task::{self, AiTaskStatus},
            order::OrderStatus,
        },
        repositories::OrderRepository,
    },
    services::{
        ai_tasks::{
            self,
            provider::{PollOutcome, SubmitOutcome},
        },
        clock::Clock,
        orders,
    },
    utils::security::sign_hex,
};

mod support;

use support::{PROVIDER_SECRET, TestApp, draft};

#[tokio::test]
async fn synchronous_renders_complete_the_order() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 2).await;

    assert!(order.hd_image.as_deref().unwrap().starts_with("https://cdn.test/renders/"));
    assert!(order.retouch_completed_at.is_some());
    assert_eq!(app.render_ids(order.id).await.len(), 2);

    let triggers = app
        .events(order.id)
        .await
        .into_iter()
        .map(|event| event.trigger)
        .collect::<Vec<_>>();
    assert_eq!(
        triggers,
        ["payment", "shooting_started", "admin", "ai_started", "ai_completed"]
    );
}

#[tokio::test]
async fn async_job_is_polled_until_done() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();
    let submitted = app.task(task.id).await;
    assert_eq!(submitted.status, AiTaskStatus::Submitted);
    assert_eq!(submitted.provider_job_id.as_deref(), Some("job-1"));
    assert_eq!(app.status(order.id).await, OrderStatus::AiProcessing);

    app.provider.on_poll(Ok(PollOutcome::Running));
    let polling = ai_tasks::poll(&app.state, task.id).await.unwrap();
    assert_eq!(polling.status, AiTaskStatus::Polling);
    assert!(polling.next_attempt_at.is_some());

    app.provider.on_poll(Ok(PollOutcome::Completed {
        result_url: "https://cdn.test/renders/hd_async.png".into(),
    }));
    let done = ai_tasks::poll(&app.state, task.id).await.unwrap();
    assert_eq!(done.status, AiTaskStatus::Completed);
    assert_eq!(done.result_image_path.as_deref(), Some("https://cdn.test/renders/hd_async.png"));

    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);
}

#[tokio::test]
async fn tick_polls_only_tasks_that_are_due() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    let idle = ai_tasks::tick(&app.state).await.unwrap();
    assert_eq!(idle.polled, 0);

    app.advance(Duration::minutes(2));
    app.provider.on_poll(Ok(PollOutcome::Completed {
        result_url: "https://cdn.test/renders/hd_tick.png".into(),
    }));
    let report = ai_tasks::tick(&app.state).await.unwrap();

    assert_eq!(report.polled, 1);
    assert_eq!(report.errors, 0);
    assert_eq!(app.task(task.id).await.status, AiTaskStatus::Completed);
    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);
}

#[tokio::test]
async fn submit_errors_retry_until_the_provider_limit() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    app.provider.fails_with("upstream 502");
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    let retrying = app.task(task.id).await;
    assert_eq!(retrying.status, AiTaskStatus::Pending);
    assert_eq!(retrying.attempt_count, 1);
    assert!(retrying.next_attempt_at.is_some());

    app.advance(Duration::minutes(1));
    app.provider.fails_with("upstream 502");
    ai_tasks::tick(&app.state).await.unwrap();

    let failed = app.task(task.id).await;
    assert_eq!(failed.status, AiTaskStatus::Failed);
    assert_eq!(failed.attempt_count, 2);

    // Every active task failed: the order goes back to the retoucher.
    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::Retouching);
    assert!(order.has_failed_task);
    assert!(order.ai_last_error.as_deref().unwrap().contains("upstream 502"));
}

#[tokio::test]
async fn provider_reported_failure_resubmits_in_place() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    app.provider.on_poll(Ok(PollOutcome::Failed {
        message: "nsfw filter".into(),
    }));
    app.provider.on_submit(Ok(SubmitOutcome::Accepted {
        job_id: "job-retry".into(),
    }));
    let resubmitted = ai_tasks::poll(&app.state, task.id).await.unwrap();

    assert_eq!(resubmitted.attempt_count, 2);
    assert_eq!(resubmitted.provider_job_id.as_deref(), Some("job-retry"));
    assert!(!resubmitted.status.is_terminal());
    assert_eq!(app.provider.submit_count(), 2);
}

#[tokio::test]
async fn completed_tasks_ignore_late_replies() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    let body = serde_json::to_vec(&json!({
        "task_id": task.id,
        "status": "success",
        "result_url": "https://cdn.test/renders/hd_pushed.png",
    }))
    .unwrap();
    let signature = sign_hex(PROVIDER_SECRET, &body).unwrap();
    let done = ai_tasks::provider_reply(&app.state, app.provider_id, &body, Some(&signature))
        .await
        .unwrap();
    assert_eq!(done.status, AiTaskStatus::Completed);

    let late = serde_json::to_vec(&json!({
        "task_id": task.id,
        "status": "failed",
        "error": "stale worker",
    }))
    .unwrap();
    let signature = sign_hex(PROVIDER_SECRET, &late).unwrap();
    let unchanged = ai_tasks::provider_reply(&app.state, app.provider_id, &late, Some(&signature))
        .await
        .unwrap();

    assert_eq!(unchanged.status, AiTaskStatus::Completed);
    assert_eq!(unchanged.version, done.version);
    assert_eq!(
        unchanged.result_image_path.as_deref(),
        Some("https://cdn.test/renders/hd_pushed.png")
    );
}

#[tokio::test]
async fn unsigned_provider_replies_are_rejected() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    let body = serde_json::to_vec(&json!({ "task_id": task.id, "status": "success" })).unwrap();
    let err = ai_tasks::provider_reply(&app.state, app.provider_id, &body, Some("deadbeef"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidSignature));
    assert_eq!(app.task(task.id).await.status, AiTaskStatus::Pending);
}

#[tokio::test]
async fn cancelling_a_task_is_idempotent() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    ai_tasks::submit(&app.state, task.id).await.unwrap();

    let cancelled = ai_tasks::cancel(&app.state, task.id, "admin").await.unwrap();
    assert_eq!(cancelled.status, AiTaskStatus::Cancelled);
    assert!(cancelled.cancel_requested);
    assert_eq!(app.provider.cancel_calls.lock().unwrap().as_slice(), ["job-1"]);

    let again = ai_tasks::cancel(&app.state, task.id, "admin").await.unwrap();
    assert_eq!(again.version, cancelled.version);

    let err = ai_tasks::submit(&app.state, task.id).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::GuardFailed(GuardReason::TaskNotSubmittable)
    ));
}

#[tokio::test]
async fn only_failed_tasks_can_be_resubmitted() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    let err = ai_tasks::resubmit(&app.state, task.id, "admin").await.unwrap_err();
    assert!(matches!(err, AppError::GuardFailed(GuardReason::TaskNotFailed)));
}

#[tokio::test]
async fn cancelling_the_order_cancels_its_tasks() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    orders::request_cancel(&app.state, order.id, None, "admin", None)
        .await
        .unwrap();

    assert_eq!(app.status(order.id).await, OrderStatus::Cancelled);
    assert_eq!(app.task(task.id).await.status, AiTaskStatus::Cancelled);
}

#[tokio::test]
async fn racing_submits_reach_the_provider_once() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;
    app.provider.slow_down(std::time::Duration::from_millis(50));

    let (first, second) = tokio::join!(
        ai_tasks::submit(&app.state, task.id),
        ai_tasks::submit(&app.state, task.id),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes.iter().filter_map(|outcome| outcome.as_ref().err()).all(|err| matches!(
        err,
        AppError::GuardFailed(GuardReason::TaskNotSubmittable)
    )));
    assert_eq!(app.provider.submit_count(), 1);

    let submitted = app.task(task.id).await;
    assert_eq!(submitted.status, AiTaskStatus::Submitted);
    assert_eq!(submitted.attempt_count, 1);
    assert_eq!(submitted.provider_job_id.as_deref(), Some("job-1"));
}

#[tokio::test]
async fn abandoned_submit_claims_are_picked_up_again() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    let mut stuck: ai_task::ActiveModel = task.clone().into();
    stuck.status = Set(AiTaskStatus::Submitting);
    stuck.attempt_count = Set(1);
    stuck.next_attempt_at = Set(Some(app.clock.now() + Duration::seconds(30)));
    stuck.update(app.state.db.get_connection()).await.unwrap();

    let err = ai_tasks::submit(&app.state, task.id).await.unwrap_err();
    assert!(matches!(err, AppError::GuardFailed(GuardReason::TaskNotSubmittable)));

    app.advance(Duration::minutes(1));
    let report = ai_tasks::tick(&app.state).await.unwrap();
    assert_eq!(report.submitted, 1);

    let recovered = app.task(task.id).await;
    assert_eq!(recovered.status, AiTaskStatus::Submitted);
    assert_eq!(recovered.attempt_count, 2);
}

fn signed_success(task_id: uuid::Uuid, result_url: &str) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&json!({
        "task_id": task_id,
        "status": "success",
        "result_url": result_url,
    }))
    .unwrap();
    let signature = sign_hex(PROVIDER_SECRET, &body).unwrap();
    (body, signature)
}

#[tokio::test]
async fn simultaneous_completions_attach_each_render_once() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let first = app.add_task(order.id).await;
    let second = app.add_task(order.id).await;
    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    let (first_body, first_signature) = signed_success(first.id, "https://cdn.test/renders/hd_a.png");
    let (second_body, second_signature) =
        signed_success(second.id, "https://cdn.test/renders/hd_b.png");
    let (a, b) = tokio::join!(
        ai_tasks::provider_reply(&app.state, app.provider_id, &first_body, Some(&first_signature)),
        ai_tasks::provider_reply(&app.state, app.provider_id, &second_body, Some(&second_signature)),
    );
    a.unwrap();
    b.unwrap();

    let (x, y) = tokio::join!(
        ai_tasks::fan_in(&app.state, order.id),
        ai_tasks::fan_in(&app.state, order.id),
    );
    x.unwrap();
    y.unwrap();

    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);
    assert_eq!(app.render_ids(order.id).await.len(), 2);

    let images = OrderRepository::list_images(app.state.db.get_connection(), order.id)
        .await
        .unwrap();
    assert_eq!(images.iter().filter(|image| image.is_main).count(), 1);
    let ai_completed = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.trigger == "ai_completed")
        .count();
    assert_eq!(ai_completed, 1);
}
