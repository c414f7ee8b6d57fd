pub mod token;
pub mod types;

use std::{collections::BTreeSet, time::Duration};

use sea_orm::ActiveValue::Set;

use crate::{
    AppState,
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        entities::{
            order::{self, OrderStatus},
            order_image::ImageKind,
            selection_token::{self, TokenPurpose},
        },
        repositories::{CatalogRepository, OrderRepository, SelectionTokenRepository},
    },
    services::{
        billing,
        orders::{self, TransitionRequest, Trigger},
        selection::token::SelectionClaims,
    },
};

pub use types::{ConfirmResult, IssuedToken, PickReceipt, Pricing, RenderVariant, SelectionSession};

const CUSTOMER_ACTOR: &str = "customer";

const CONFIRM_WAIT_ROUNDS: usize = 40;
const CONFIRM_WAIT_STEP: Duration = Duration::from_millis(25);

async fn issue(state: &AppState, order_id: i32, purpose: TokenPurpose) -> Result<IssuedToken> {
    let now = state.clock.now();
    let (token, claims) = state.tokens.issue(order_id, purpose, now)?;

    SelectionTokenRepository::insert(
        state.db.get_connection(),
        &claims.jti,
        order_id,
        purpose,
        now,
        claims.expires_at(),
    )
    .await?;

    Ok(IssuedToken {
        token,
        purpose,
        expires_at: claims.expires_at(),
    })
}

/// Verifies a presented token against its signature, its row and the clock.
async fn redeem(
    state: &AppState,
    token: &str,
    purpose: TokenPurpose,
) -> Result<(SelectionClaims, selection_token::Model)> {
    let claims = state.tokens.decode(token, purpose)?;

    let row = SelectionTokenRepository::find_by_jti(state.db.get_connection(), &claims.jti)
        .await?
        .filter(|row| row.order_id == claims.order_id && row.purpose == purpose)
        .ok_or(AppError::InvalidToken)?;

    Ok((claims, row))
}

fn require_live(state: &AppState, row: &selection_token::Model) -> Result<()> {
    if row.revoked_at.is_some() {
        return Err(AppError::InvalidToken);
    }
    if state.clock.now() >= row.expires_at {
        return Err(AppError::TokenExpired);
    }
    Ok(())
}

fn require_open(order: &order::Model) -> Result<()> {
    if order.order_status()? != OrderStatus::PendingSelection {
        return Err(AppError::GuardFailed(GuardReason::SelectionClosed));
    }
    Ok(())
}

async fn load_order(state: &AppState, order_id: i32) -> Result<order::Model> {
    OrderRepository::find_by_id(state.db.get_connection(), order_id)
        .await?
        .ok_or(AppError::OrderNotFound)
}

pub async fn pricing(state: &AppState, order: &order::Model) -> Result<Pricing> {
    let product = match order.product_name.as_deref() {
        Some(name) => CatalogRepository::product_by_name(state.db.get_connection(), name).await?,
        None => None,
    };

    Ok(match product {
        Some(product) => Pricing {
            free_selection_count: product.free_selection_count,
            extra_photo_price_cents: product.extra_photo_price_cents,
        },
        None => Pricing {
            free_selection_count: state.config.selection.default_free_selection_count,
            extra_photo_price_cents: state.config.selection.default_extra_photo_price_cents,
        },
    })
}

/// Issues the customer's view link for an order awaiting selection.
pub async fn issue_view_token(state: &AppState, order: &order::Model) -> Result<IssuedToken> {
    require_open(order)?;

    let issued = issue(state, order.id, TokenPurpose::View).await?;

    tracing::info!(
        order_id = order.id,
        expires_at = %issued.expires_at,
        "Selection view token issued"
    );

    Ok(issued)
}

pub async fn open_session(state: &AppState, view_token: &str) -> Result<SelectionSession> {
    let (claims, row) = redeem(state, view_token, TokenPurpose::View).await?;
    require_live(state, &row)?;

    let order = load_order(state, claims.order_id).await?;
    require_open(&order)?;

    let pricing = pricing(state, &order).await?;
    let variants = OrderRepository::list_images(state.db.get_connection(), order.id)
        .await?
        .into_iter()
        .filter(|image| image.kind == ImageKind::Render)
        .map(RenderVariant::from)
        .collect::<Vec<_>>();

    let pick = issue(state, order.id, TokenPurpose::Pick).await?;
    let confirm = issue(state, order.id, TokenPurpose::Confirm).await?;

    tracing::debug!(order_id = order.id, variants = variants.len(), "Selection session opened");

    Ok(SelectionSession {
        order_id: order.id,
        order_number: order.order_number,
        pricing,
        variants,
        confirmation_deadline: order.confirmation_deadline,
        pick,
        confirm,
    })
}

/// Records the chosen renders and settles the surplus fee.
///
/// Resubmitting replaces the previous picks; a franchisee is charged only
/// the difference to what was already debited.
pub async fn submit_picks(
    state: &AppState,
    pick_token: &str,
    image_ids: Vec<i32>,
) -> Result<PickReceipt> {
    let (claims, row) = redeem(state, pick_token, TokenPurpose::Pick).await?;
    require_live(state, &row)?;
    let order_id = claims.order_id;

    let picks = image_ids.into_iter().collect::<BTreeSet<_>>();
    if picks.is_empty() {
        return Err(AppError::InvalidParams("Pick at least one photo".into()));
    }

    let renders = OrderRepository::list_images(state.db.get_connection(), order_id)
        .await?
        .into_iter()
        .filter(|image| image.kind == ImageKind::Render)
        .map(|image| image.id)
        .collect::<BTreeSet<_>>();
    if let Some(foreign) = picks.difference(&renders).next() {
        return Err(AppError::InvalidParams(format!(
            "Image {foreign} does not belong to this order"
        )));
    }
    let picks = picks.into_iter().collect::<Vec<_>>();

    let order = load_order(state, order_id).await?;
    let pricing = pricing(state, &order).await?;
    let (extra_count, extra_fee_cents) = pricing.extra_for(picks.len());

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;
    if let Err(err) = require_open(&order) {
        uow.rollback().await?;
        return Err(err);
    }

    OrderRepository::set_selection(uow.connection(), order_id, &picks).await?;

    let mut active: order::ActiveModel = order.clone().into();
    let charged_to_franchisee = match order.franchisee_id {
        Some(franchisee_id) => {
            if let Err(err) =
                billing::apply_selection_charge(&uow, franchisee_id, order_id, extra_fee_cents, now)
                    .await
            {
                uow.rollback().await?;
                return Err(err);
            }
            active.selection_extra_cents = Set(extra_fee_cents);
            active.selection_extra_paid = Set(true);
            extra_fee_cents > 0
        }
        None => {
            if extra_fee_cents != order.selection_extra_cents {
                active.selection_extra_cents = Set(extra_fee_cents);
                active.selection_extra_paid = Set(false);
            }
            false
        }
    };

    let saved = OrderRepository::save(uow.connection(), &order, active, now).await?;
    uow.commit().await?;

    tracing::info!(
        order_id,
        picks = picks.len(),
        extra_fee_cents,
        charged_to_franchisee,
        "Selection recorded"
    );

    Ok(PickReceipt {
        order_id,
        selected_image_ids: picks,
        extra_count,
        extra_fee_cents,
        charged_to_franchisee,
        payment_pending: orders::guards::extra_payment_outstanding(&saved),
    })
}

/// Single-use confirmation. Repeating it returns the first outcome.
pub async fn confirm(state: &AppState, confirm_token: &str) -> Result<ConfirmResult> {
    let (claims, row) = redeem(state, confirm_token, TokenPurpose::Confirm).await?;

    if let Some(stored) = row.result.clone().filter(|_| row.consumed_at.is_some()) {
        return Ok(serde_json::from_value(stored)?);
    }

    if row.consumed_at.is_none() {
        require_live(state, &row)?;

        let db_connection = state.db.get_connection();
        if SelectionTokenRepository::claim(db_connection, &row.jti, state.clock.now()).await? {
            return match settle_confirmation(state, claims.order_id).await {
                Ok(result) => {
                    SelectionTokenRepository::record_result(
                        state.db.get_connection(),
                        &row.jti,
                        serde_json::to_value(&result)?,
                    )
                    .await?;
                    Ok(result)
                }
                Err(err) => {
                    SelectionTokenRepository::release(state.db.get_connection(), &row.jti).await?;
                    Err(err)
                }
            };
        }
    }

    await_confirmation(state, &row.jti).await
}

/// Waits for the holder of a claimed token to record its result.
async fn await_confirmation(state: &AppState, jti: &str) -> Result<ConfirmResult> {
    for _ in 0..CONFIRM_WAIT_ROUNDS {
        let row = SelectionTokenRepository::find_by_jti(state.db.get_connection(), jti)
            .await?
            .ok_or(AppError::InvalidToken)?;

        match (row.consumed_at, row.result) {
            (Some(_), Some(stored)) => return Ok(serde_json::from_value(stored)?),
            (None, _) if row.revoked_at.is_some() => return Err(AppError::InvalidToken),
            (None, _) => {
                return Err(AppError::Conflict(
                    "confirmation failed concurrently, retry".into(),
                ));
            }
            (Some(_), None) => tokio::time::sleep(CONFIRM_WAIT_STEP).await,
        }
    }

    Err(AppError::Conflict("confirmation still in progress".into()))
}

async fn settle_confirmation(state: &AppState, order_id: i32) -> Result<ConfirmResult> {
    let order = load_order(state, order_id).await?;
    let previous = SelectionTokenRepository::find_confirmed_result(state.db.get_connection(), order_id)
        .await?;

    let status = order.order_status()?;

    match previous {
        _ if status == OrderStatus::PendingSelection => {
            let confirmed =
                confirm_order(state, order_id, Trigger::SelectionConfirmed, CUSTOMER_ACTOR, true)
                    .await?;
            confirm_result(state, &confirmed).await
        }
        Some(stored) => Ok(serde_json::from_value::<ConfirmResult>(stored)?),
        // Confirmed by the deadline sweep or an operator.
        None if status
            .spine_rank()
            .is_some_and(|rank| rank > OrderStatus::PendingSelection.spine_rank().unwrap_or(5)) =>
        {
            confirm_result(state, &order).await
        }
        None => Err(AppError::GuardFailed(GuardReason::SelectionClosed)),
    }
}

async fn confirm_result(state: &AppState, order: &order::Model) -> Result<ConfirmResult> {
    let selected_image_ids = OrderRepository::list_images(state.db.get_connection(), order.id)
        .await?
        .into_iter()
        .filter(|image| image.is_selected)
        .map(|image| image.id)
        .collect();

    Ok(ConfirmResult {
        order_id: order.id,
        order_number: order.order_number.clone(),
        status: order.order_status()?,
        selected_image_ids,
        confirmed_at: order.franchisee_confirmed_at.unwrap_or(order.updated_at),
    })
}

/// Moves the order to `selection_completed`; the guards check picks and surplus.
pub async fn confirm_order(
    state: &AppState,
    order_id: i32,
    trigger: Trigger,
    actor: &str,
    franchisee_confirmed: bool,
) -> Result<order::Model> {
    let request = TransitionRequest::new(order_id, OrderStatus::SelectionCompleted, trigger, actor);

    let confirmed = orders::transition_with(state, request, move |active| {
        if franchisee_confirmed {
            active.franchisee_confirmed = Set(true);
        }
    })
    .await?;

    // Entry effects may already have moved the order on.
    load_order(state, confirmed.id).await
}

/// Marks the customer's surplus fee as paid.
pub async fn record_extra_payment(
    state: &AppState,
    order_id: i32,
    transaction_id: &str,
) -> Result<order::Model> {
    if transaction_id.trim().is_empty() {
        return Err(AppError::InvalidParams("transaction_id is required".into()));
    }

    let order = orders::update_fields(
        state,
        order_id,
        |order| {
            require_open(order)?;
            if order.franchisee_id.is_some() || order.selection_extra_cents <= 0 {
                return Err(AppError::InvalidParams(
                    "No extra payment is due for this order".into(),
                ));
            }
            Ok(())
        },
        |active| active.selection_extra_paid = Set(true),
    )
    .await?;

    tracing::info!(
        order_id,
        transaction_id,
        amount_cents = order.selection_extra_cents,
        "Selection surplus paid"
    );

    Ok(order)
}

pub async fn revoke_tokens(state: &AppState, order_id: i32) -> Result<u64> {
    let revoked = SelectionTokenRepository::revoke_for_order(
        state.db.get_connection(),
        order_id,
        state.clock.now(),
    )
    .await?;

    if revoked > 0 {
        tracing::info!(order_id, revoked, "Selection tokens revoked");
    }

    Ok(revoked)
}
