use chrono::Duration;

use fulfillment::{
    error::{AppError, GuardReason},
    infrastructure::db::{entities::order::OrderStatus, repositories::OrderDraft},
    services::{orders, selection},
};

mod support;

use support::{TestApp, draft};

async fn session_for(app: &TestApp, order_id: i32) -> selection::SelectionSession {
    let order = app.order(order_id).await;
    let view = selection::issue_view_token(&app.state, &order).await.unwrap();
    selection::open_session(&app.state, &view.token).await.unwrap()
}

#[tokio::test]
async fn view_token_opens_a_session_with_every_render() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 3).await;

    let session = session_for(&app, order.id).await;

    assert_eq!(session.order_id, order.id);
    assert_eq!(session.variants.len(), 3);
    assert_eq!(session.pricing.free_selection_count, 1);
    assert_eq!(session.pricing.extra_photo_price_cents, 1_000);
    assert!(session.pick.expires_at < session.confirm.expires_at + Duration::seconds(1));
}

#[tokio::test]
async fn tokens_are_bound_to_their_purpose() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 1).await;
    let session = session_for(&app, order.id).await;

    let err = selection::open_session(&app.state, &session.pick.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));

    let err = selection::confirm(&app.state, &session.pick.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));

    let err = selection::open_session(&app.state, "not-a-token")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
}

#[tokio::test]
async fn expired_tokens_are_refused() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 1).await;
    let session = session_for(&app, order.id).await;

    app.advance(Duration::hours(3));

    let err = selection::submit_picks(&app.state, &session.pick.token, vec![session.variants[0].id])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TokenExpired));
}

#[tokio::test]
async fn picks_must_belong_to_the_order() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 2).await;
    let session = session_for(&app, order.id).await;

    let err = selection::submit_picks(&app.state, &session.pick.token, vec![9_999])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidParams(_)));

    let err = selection::submit_picks(&app.state, &session.pick.token, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidParams(_)));
}

#[tokio::test]
async fn picks_within_the_free_quota_confirm_straight_away() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 2).await;
    let session = session_for(&app, order.id).await;
    let chosen = session.variants[1].id;

    let receipt = selection::submit_picks(&app.state, &session.pick.token, vec![chosen, chosen])
        .await
        .unwrap();
    assert_eq!(receipt.selected_image_ids, vec![chosen]);
    assert_eq!(receipt.extra_fee_cents, 0);
    assert!(!receipt.payment_pending);

    let confirmed = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap();
    assert_eq!(confirmed.selected_image_ids, vec![chosen]);

    // Confirmation hands the order straight to the print house.
    assert_eq!(app.status(order.id).await, OrderStatus::Printing);
    assert_eq!(app.printer.submit_count(), 1);
}

#[tokio::test]
async fn confirm_replays_its_first_result() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 1).await;
    let session = session_for(&app, order.id).await;
    selection::submit_picks(&app.state, &session.pick.token, vec![session.variants[0].id])
        .await
        .unwrap();

    let first = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap();
    app.advance(Duration::minutes(5));
    let second = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap();

    assert_eq!(first.confirmed_at, second.confirmed_at);
    assert_eq!(first.selected_image_ids, second.selected_image_ids);
    assert_eq!(first.status, OrderStatus::Printing);
    assert_eq!(app.printer.submit_count(), 1);

    let completions = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.to_status == "selection_completed")
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn racing_confirms_share_one_outcome() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 1).await;
    let session = session_for(&app, order.id).await;
    selection::submit_picks(&app.state, &session.pick.token, vec![session.variants[0].id])
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        selection::confirm(&app.state, &session.confirm.token),
        selection::confirm(&app.state, &session.confirm.token),
    );
    let first = first.unwrap();
    let second = second.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.status, OrderStatus::Printing);
    assert_eq!(app.printer.submit_count(), 1);

    let completions = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.to_status == "selection_completed")
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn confirming_without_picks_fails() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 1).await;
    let session = session_for(&app, order.id).await;

    let err = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::GuardFailed(GuardReason::NoPicks)));
    assert_eq!(app.status(order.id).await, OrderStatus::PendingSelection);
}

#[tokio::test]
async fn customer_surplus_must_be_paid_before_confirming() {
    let app = TestApp::new().await;
    let order = app.order_awaiting_selection(draft(), 3).await;
    let session = session_for(&app, order.id).await;
    let all = session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();

    let receipt = selection::submit_picks(&app.state, &session.pick.token, all)
        .await
        .unwrap();
    assert_eq!(receipt.extra_count, 2);
    assert_eq!(receipt.extra_fee_cents, 2_000);
    assert!(!receipt.charged_to_franchisee);
    assert!(receipt.payment_pending);

    let err = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::GuardFailed(GuardReason::ExtraPaymentPending)
    ));

    selection::record_extra_payment(&app.state, order.id, "TX-EXTRA")
        .await
        .unwrap();
    let confirmed = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap();
    assert_eq!(confirmed.selected_image_ids.len(), 3);
}

#[tokio::test]
async fn franchisee_surplus_is_debited_by_difference() {
    let app = TestApp::new().await;
    let franchisee = app.franchisee(5_000).await;
    let order = app
        .order_awaiting_selection(
            OrderDraft {
                franchisee_id: Some(franchisee.id),
                ..draft()
            },
            3,
        )
        .await;
    let session = session_for(&app, order.id).await;
    let ids = session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();

    let receipt = selection::submit_picks(&app.state, &session.pick.token, ids.clone())
        .await
        .unwrap();
    assert!(receipt.charged_to_franchisee);
    assert!(!receipt.payment_pending);
    assert_eq!(app.franchisee_balance(franchisee.id).await, 3_000);

    // Resubmitting with fewer picks credits the difference back.
    selection::submit_picks(&app.state, &session.pick.token, ids[..2].to_vec())
        .await
        .unwrap();
    assert_eq!(app.franchisee_balance(franchisee.id).await, 4_000);

    // Same picks again: no movement.
    selection::submit_picks(&app.state, &session.pick.token, ids[..2].to_vec())
        .await
        .unwrap();
    assert_eq!(app.franchisee_balance(franchisee.id).await, 4_000);
}

#[tokio::test]
async fn franchisee_balance_never_goes_negative() {
    let app = TestApp::new().await;
    let franchisee = app.franchisee(500).await;
    let order = app
        .order_awaiting_selection(
            OrderDraft {
                franchisee_id: Some(franchisee.id),
                ..draft()
            },
            2,
        )
        .await;
    let session = session_for(&app, order.id).await;
    let ids = session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();

    let err = selection::submit_picks(&app.state, &session.pick.token, ids)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::GuardFailed(GuardReason::InsufficientBalance)
    ));
    assert_eq!(app.franchisee_balance(franchisee.id).await, 500);
    assert_eq!(app.order(order.id).await.selection_extra_cents, 0);
}

#[tokio::test]
async fn cancelled_orders_release_the_surplus_and_revoke_tokens() {
    let app = TestApp::new().await;
    let franchisee = app.franchisee(5_000).await;
    let order = app
        .order_awaiting_selection(
            OrderDraft {
                franchisee_id: Some(franchisee.id),
                ..draft()
            },
            2,
        )
        .await;
    let session = session_for(&app, order.id).await;
    let ids = session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();
    selection::submit_picks(&app.state, &session.pick.token, ids)
        .await
        .unwrap();
    assert_eq!(app.franchisee_balance(franchisee.id).await, 4_000);

    orders::request_cancel(&app.state, order.id, None, "admin", None)
        .await
        .unwrap();

    assert_eq!(app.franchisee_balance(franchisee.id).await, 5_000);
    let err = selection::confirm(&app.state, &session.confirm.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidToken));
}

#[tokio::test]
async fn deadline_sweep_confirms_orders_with_picks() {
    let app = TestApp::new().await;
    let order = app
        .order_awaiting_selection(
            OrderDraft {
                need_confirmation: true,
                ..draft()
            },
            1,
        )
        .await;
    assert!(order.confirmation_deadline.is_some());
    let session = session_for(&app, order.id).await;
    selection::submit_picks(&app.state, &session.pick.token, vec![session.variants[0].id])
        .await
        .unwrap();

    let early = orders::expire_tick(&app.state).await.unwrap();
    assert_eq!(early.auto_confirmed, 0);

    app.advance(Duration::days(4));
    let report = orders::expire_tick(&app.state).await.unwrap();

    assert_eq!(report.auto_confirmed, 1);
    let order = app.order(order.id).await;
    assert!(!order.franchisee_confirmed);
    assert_eq!(order.order_status().unwrap(), OrderStatus::Printing);

    let deadline_events = app
        .events(order.id)
        .await
        .into_iter()
        .filter(|event| event.trigger == "deadline_expired")
        .count();
    assert_eq!(deadline_events, 1);
}

#[tokio::test]
async fn deadline_sweep_flags_orders_without_picks() {
    let app = TestApp::new().await;
    let order = app
        .order_awaiting_selection(
            OrderDraft {
                need_confirmation: true,
                ..draft()
            },
            1,
        )
        .await;

    app.advance(Duration::days(4));
    let report = orders::expire_tick(&app.state).await.unwrap();

    assert_eq!(report.flagged, 1);
    let order = app.order(order.id).await;
    assert_eq!(order.order_status().unwrap(), OrderStatus::PendingSelection);
    assert!(order.needs_manual_review);
    assert_eq!(
        order.manual_review_reason.as_deref(),
        Some("confirmation_deadline_passed")
    );
}

#[tokio::test]
async fn one_franchisee_cannot_fund_two_surpluses_it_cannot_cover() {
    let app = TestApp::new().await;
    let franchisee = app.franchisee(1_500).await;
    let first = app
        .order_awaiting_selection(
            OrderDraft {
                franchisee_id: Some(franchisee.id),
                ..draft()
            },
            2,
        )
        .await;
    let second = app
        .order_awaiting_selection(
            OrderDraft {
                franchisee_id: Some(franchisee.id),
                order_number: Some("PET20250101000000BBBB".into()),
                ..draft()
            },
            2,
        )
        .await;

    let first_session = session_for(&app, first.id).await;
    let second_session = session_for(&app, second.id).await;
    let first_ids = first_session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();
    let second_ids = second_session.variants.iter().map(|variant| variant.id).collect::<Vec<_>>();

    let (a, b) = tokio::join!(
        selection::submit_picks(&app.state, &first_session.pick.token, first_ids),
        selection::submit_picks(&app.state, &second_session.pick.token, second_ids),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .filter_map(|outcome| outcome.as_ref().err())
            .all(|err| matches!(err, AppError::GuardFailed(GuardReason::InsufficientBalance)))
    );
    assert_eq!(app.franchisee_balance(franchisee.id).await, 500);

    let charged = [app.order(first.id).await, app.order(second.id).await]
        .iter()
        .filter(|order| order.selection_extra_cents == 1_000)
        .count();
    assert_eq!(charged, 1);
}
