//! End-to-end walks through the order lifecycle.

use chrono::Duration;
use sea_orm::ActiveValue::Set;
use serde_json::json;

use fulfillment::{
    infrastructure::db::{
        entities::{
            ai_task::AiTaskStatus,
            order::{OrderStatus, PrinterSendStatus},
            order_image::ImageKind,
        },
        repositories::{AiTaskRepository, OrderRepository},
    },
    services::{
        ai_tasks::{self, provider::PollOutcome},
        clock::Clock,
        orders::{self, CancelOutcome, TransitionRequest, Trigger},
        printer::{self, DispatchOutcome},
        selection,
    },
    utils::security::sign_hex,
};

mod support;

use support::{CALLBACK_SECRET, TestApp, draft, unavailable};

async fn pick_and_confirm(app: &TestApp, order_id: i32) {
    let order = app.order(order_id).await;
    let view = selection::issue_view_token(&app.state, &order).await.unwrap();
    let session = selection::open_session(&app.state, &view.token).await.unwrap();
    selection::submit_picks(&app.state, &session.pick.token, vec![session.variants[0].id])
        .await
        .unwrap();
    selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap();
}

#[tokio::test]
async fn happy_path_from_payment_to_shipping() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    let task = app.add_task(order.id).await;

    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();
    assert_eq!(app.status(order.id).await, OrderStatus::AiProcessing);

    app.provider.on_poll(Ok(PollOutcome::Running));
    app.provider.on_poll(Ok(PollOutcome::Running));
    app.provider.on_poll(Ok(PollOutcome::Completed {
        result_url: "https://cdn.test/renders/hd_final.png".into(),
    }));
    for _ in 0..3 {
        app.advance(Duration::minutes(2));
        ai_tasks::tick(&app.state).await.unwrap();
    }
    assert_eq!(app.task(task.id).await.status, AiTaskStatus::Completed);
    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);

    pick_and_confirm(&app, order.id).await;
    assert_eq!(app.status(order.id).await, OrderStatus::Printing);

    let body = serde_json::to_vec(&json!({
        "order_no": order.order_number,
        "product_category": order.product_category,
        "logistics_company": "SF Express",
        "tracking_number": "SF0001",
    }))
    .unwrap();
    let signature = sign_hex(CALLBACK_SECRET, &body).unwrap();
    printer::logistics_callback(&app.state, &body, Some(&signature))
        .await
        .unwrap();

    let shipped = app.order(order.id).await;
    assert_eq!(shipped.order_status().unwrap(), OrderStatus::Shipped);

    let path = app
        .events(order.id)
        .await
        .into_iter()
        .map(|event| event.to_status)
        .collect::<Vec<_>>();
    assert_eq!(
        path,
        [
            "paid",
            "shooting",
            "retouching",
            "ai_processing",
            "pending_selection",
            "selection_completed",
            "printing",
            "pending_shipment",
            "shipped",
        ]
    );
}

#[tokio::test]
async fn print_house_outage_is_ridden_out() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        app.printer.on_submit(Ok(unavailable()));
    }

    let order = app.order_awaiting_selection(draft(), 1).await;
    pick_and_confirm(&app, order.id).await;
    assert_eq!(app.status(order.id).await, OrderStatus::SelectionCompleted);

    for _ in 0..3 {
        app.advance(Duration::hours(2));
        printer::retry_tick(&app.state).await.unwrap();
    }

    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::Printing);
    assert_eq!(order.printer_send_status, PrinterSendStatus::SentSuccess);
    assert!(!order.needs_manual_review);
    assert_eq!(app.printer.submit_count(), 4);

    let keys = app
        .printer
        .submitted
        .lock()
        .unwrap()
        .iter()
        .map(|payload| payload["order_id"].clone())
        .collect::<Vec<_>>();
    assert!(keys.iter().all(|key| *key == json!(order.external_key())));

    let printing_events = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.to_status == "printing")
        .count();
    assert_eq!(printing_events, 1);
}

#[tokio::test]
async fn one_failed_render_is_resubmitted_by_an_operator() {
    let app = TestApp::new().await;
    let order = app.retouched_order(draft()).await;
    for _ in 0..3 {
        app.add_task(order.id).await;
    }
    app.provider.completes_with("https://cdn.test/renders/hd_a.png");
    app.provider.fails_with("gpu out of memory");
    app.provider.completes_with("https://cdn.test/renders/hd_c.png");

    ai_tasks::start_order(&app.state, order.id, "studio", None)
        .await
        .unwrap();

    app.advance(Duration::minutes(1));
    app.provider.fails_with("gpu out of memory");
    ai_tasks::tick(&app.state).await.unwrap();

    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::AiProcessing);
    assert!(order.has_failed_task);

    let tasks = AiTaskRepository::list_active_for_order(app.state.db.get_connection(), order.id)
        .await
        .unwrap();
    let failed = tasks
        .iter()
        .find(|task| task.status == AiTaskStatus::Failed)
        .expect("one task failed");
    assert_eq!(failed.attempt_count, 2);

    app.provider.completes_with("https://cdn.test/renders/hd_b.png");
    let replacement = ai_tasks::resubmit(&app.state, failed.id, "admin")
        .await
        .unwrap();
    assert_eq!(replacement.status, AiTaskStatus::Completed);

    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::PendingSelection);
    assert!(!order.has_failed_task);
    assert_eq!(app.render_ids(order.id).await.len(), 3);
}

#[tokio::test]
async fn concurrent_operator_moves_apply_once() {
    let app = TestApp::new().await;
    app.printer.on_submit(Ok(unavailable()));
    let order = app.order_awaiting_selection(draft(), 1).await;
    pick_and_confirm(&app, order.id).await;

    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::SelectionCompleted);
    assert_eq!(order.printer_send_status, PrinterSendStatus::SentFailed);

    let (first, second) = tokio::join!(
        orders::admin_transition(&app.state, order.id, OrderStatus::Printing, "alice", Some(order.version)),
        orders::admin_transition(&app.state, order.id, OrderStatus::Printing, "bob", Some(order.version)),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|err| err.is_conflict())
    );

    assert_eq!(app.status(order.id).await, OrderStatus::Printing);
    let printing_events = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.to_status == "printing")
        .count();
    assert_eq!(printing_events, 1);
}

#[tokio::test]
async fn legacy_status_rows_join_the_lifecycle() {
    let app = TestApp::new().await;
    let order = app.create_order(draft()).await;
    app.force(order.id, |active| {
        active.status = Set("hd_ready".into());
        active.hd_image = Set(Some("https://cdn.test/renders/hd_legacy.png".into()));
    })
    .await;
    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);

    let db_connection = app.state.db.get_connection();
    let render = OrderRepository::add_image(
        db_connection,
        order.id,
        "https://cdn.test/renders/hd_legacy.png",
        ImageKind::Render,
        None,
        app.clock.now(),
    )
    .await
    .unwrap();
    OrderRepository::set_selection(db_connection, order.id, &[render.id])
        .await
        .unwrap();

    orders::transition(
        &app.state,
        TransitionRequest::new(order.id, OrderStatus::SelectionCompleted, Trigger::Admin, "admin"),
    )
    .await
    .unwrap();

    let events = app.events(order.id).await;
    assert_eq!(events[0].from_status, "pending_selection");
    assert_eq!(events[0].to_status, "selection_completed");
    assert_eq!(app.status(order.id).await, OrderStatus::Printing);
}

#[tokio::test]
async fn cancel_during_dispatch_waits_for_the_print_house() {
    let app = TestApp::new().await;
    app.printer.on_submit(Ok(unavailable()));
    let order = app.order_awaiting_selection(draft(), 1).await;
    pick_and_confirm(&app, order.id).await;

    app.force(order.id, |active| {
        active.printer_send_status = Set(PrinterSendStatus::Sending);
    })
    .await;

    let outcome = orders::request_cancel(&app.state, order.id, Some("duplicate order".into()), "admin", None)
        .await
        .unwrap();
    assert!(matches!(outcome, CancelOutcome::Queued(_)));
    assert_eq!(app.status(order.id).await, OrderStatus::SelectionCompleted);
    assert!(app.order(order.id).await.cancel_requested_at.is_some());

    // The in-flight attempt is abandoned once its window passes.
    app.advance(Duration::minutes(5));
    let dispatched = printer::dispatch(&app.state, order.id, "system").await.unwrap();

    assert!(matches!(dispatched, DispatchOutcome::Sent(_)));
    assert_eq!(app.printer.cancel_count(), 1);
    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::Cancelled);
    assert_eq!(order.cancel_reason.as_deref(), Some("duplicate order"));
}
