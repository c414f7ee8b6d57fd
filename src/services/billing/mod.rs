use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;

use crate::{
    AppState,
    error::{AppError, GuardReason, Result},
    infrastructure::db::{
        UnitOfWork,
        entities::{coupon::CouponStatus, coupon_usage, franchisee_deduction, order},
        repositories::{CouponRepository, FranchiseeRepository, OrderRepository},
    },
};

const SELECTION_EXTRA_REASON: &str = "selection_extra";

pub fn selection_charge_key(order_id: i32) -> String {
    format!("selection-extra:{order_id}")
}

/// Brings the franchisee's debit for an order's surplus picks to `amount_cents`.
///
/// Runs inside the caller's unit of work, after the order row was locked.
/// Only the difference to the previous debit moves the balance.
pub async fn apply_selection_charge(
    uow: &UnitOfWork,
    franchisee_id: i32,
    order_id: i32,
    amount_cents: i64,
    now: DateTime<Utc>,
) -> Result<Option<franchisee_deduction::Model>> {
    let key = selection_charge_key(order_id);
    let existing = FranchiseeRepository::find_deduction(uow.connection(), &key).await?;
    let previous = existing.as_ref().map_or(0, |deduction| deduction.amount_cents);

    let delta = amount_cents - previous;
    if delta == 0 {
        return Ok(existing);
    }

    let franchisee = uow.franchisee_for_update(franchisee_id).await?;
    let balance = franchisee.balance_cents - delta;
    if balance < 0 {
        tracing::info!(
            franchisee_id,
            order_id,
            balance_cents = franchisee.balance_cents,
            requested_cents = delta,
            "Franchisee balance too low for selection surplus"
        );
        return Err(AppError::GuardFailed(GuardReason::InsufficientBalance));
    }

    FranchiseeRepository::save_balance(uow.connection(), &franchisee, balance, now).await?;

    let deduction = match existing {
        Some(deduction) => {
            FranchiseeRepository::update_deduction(uow.connection(), deduction, amount_cents, now)
                .await?
        }
        None => {
            FranchiseeRepository::record_deduction(
                uow.connection(),
                franchisee_id,
                order_id,
                amount_cents,
                &key,
                SELECTION_EXTRA_REASON,
                now,
            )
            .await?
        }
    };

    tracing::info!(
        franchisee_id,
        order_id,
        delta_cents = delta,
        balance_cents = balance,
        "Franchisee balance adjusted"
    );

    Ok(Some(deduction))
}

/// Credits back the surplus debit of a cancelled or refunded order.
pub async fn release_selection_charge(state: &AppState, order: &order::Model) -> Result<()> {
    let Some(franchisee_id) = order.franchisee_id else {
        return Ok(());
    };

    let key = selection_charge_key(order.id);
    let pending = FranchiseeRepository::find_deduction(state.db.get_connection(), &key).await?;
    if pending.is_none_or(|deduction| deduction.amount_cents == 0) {
        return Ok(());
    }

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let Some(deduction) = FranchiseeRepository::find_deduction(uow.connection(), &key).await? else {
        uow.rollback().await?;
        return Ok(());
    };

    let franchisee = uow.franchisee_for_update(franchisee_id).await?;
    let refunded = deduction.amount_cents;
    let balance = franchisee.balance_cents + refunded;

    FranchiseeRepository::save_balance(uow.connection(), &franchisee, balance, now).await?;
    FranchiseeRepository::update_deduction(uow.connection(), deduction, 0, now).await?;
    uow.commit().await?;

    tracing::info!(
        franchisee_id,
        order_id = order.id,
        refunded_cents = refunded,
        balance_cents = balance,
        "Selection surplus credited back"
    );

    Ok(())
}

/// Redeems a coupon against an order. A coupon is good for one order only.
pub async fn consume_coupon(
    state: &AppState,
    code: &str,
    order_id: i32,
) -> Result<coupon_usage::Model> {
    let code = code.trim();
    if code.is_empty() {
        return Err(AppError::InvalidParams("coupon code is required".into()));
    }

    let now = state.clock.now();
    let uow = state.db.unit_of_work().await?;
    let order = uow.order_for_update(order_id).await?;
    let coupon = uow.coupon_for_update(code).await?;

    let eligibility = async {
        if CouponRepository::find_usage(uow.connection(), coupon.id, order_id)
            .await?
            .is_some()
        {
            return Err(AppError::CouponAlreadyConsumed);
        }

        match coupon.status {
            CouponStatus::Unused => {}
            CouponStatus::Used => return Err(AppError::CouponAlreadyConsumed),
            CouponStatus::Expired => {
                return Err(AppError::GuardFailed(GuardReason::CouponUnavailable));
            }
        }

        if coupon.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return Err(AppError::GuardFailed(GuardReason::CouponExpired));
        }

        if coupon
            .customer_phone
            .as_deref()
            .is_some_and(|phone| phone != order.customer_phone)
        {
            return Err(AppError::GuardFailed(GuardReason::CouponNotOwned));
        }

        Ok(())
    }
    .await;

    if let Err(err) = eligibility {
        uow.rollback().await?;
        return Err(err);
    }

    CouponRepository::save_status(uow.connection(), &coupon, CouponStatus::Used)
        .await
        .map_err(|err| {
            if err.is_conflict() {
                AppError::CouponAlreadyConsumed
            } else {
                err
            }
        })?;

    let discount_cents = coupon.discount_for(order.price_cents);
    let usage =
        CouponRepository::record_usage(uow.connection(), coupon.id, order_id, discount_cents, now)
            .await?;

    let mut active: order::ActiveModel = order.clone().into();
    active.coupon_code = Set(Some(coupon.code.clone()));
    OrderRepository::save(uow.connection(), &order, active, now).await?;
    uow.commit().await?;

    tracing::info!(
        order_id,
        coupon_id = coupon.id,
        discount_cents,
        "Coupon consumed"
    );

    Ok(usage)
}
