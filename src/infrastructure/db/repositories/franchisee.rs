use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};

use crate::{
    error::{AppError, Result},
    infrastructure::db::{
        entities::{Franchisee, FranchiseeDeduction, franchisee, franchisee_deduction},
        repositories::cas_error,
    },
};

pub struct FranchiseeRepository;

impl FranchiseeRepository {
    pub async fn find_by_id<C: ConnectionTrait>(
        db_connection: &C,
        id: i32,
    ) -> Result<Option<franchisee::Model>> {
        Franchisee::find_by_id(id)
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn create<C: ConnectionTrait>(
        db_connection: &C,
        store_name: &str,
        balance_cents: i64,
        printer_shop_id: Option<String>,
        printer_shop_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<franchisee::Model> {
        let franchisee = franchisee::ActiveModel {
            store_name: Set(store_name.to_string()),
            balance_cents: Set(balance_cents),
            printer_shop_id: Set(printer_shop_id),
            printer_shop_name: Set(printer_shop_name),
            machine_serial_number: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(0),
            ..Default::default()
        };

        Ok(franchisee.insert(db_connection).await?)
    }

    /// Writes a new balance with a compare-and-swap on `version`.
    pub async fn save_balance<C: ConnectionTrait>(
        db_connection: &C,
        current: &franchisee::Model,
        balance_cents: i64,
        now: DateTime<Utc>,
    ) -> Result<franchisee::Model> {
        let mut active: franchisee::ActiveModel = current.clone().into();
        active.balance_cents = Set(balance_cents);
        active.updated_at = Set(now);
        active.version = Set(current.version + 1);

        Franchisee::update(active)
            .filter(franchisee::Column::Version.eq(current.version))
            .exec(db_connection)
            .await
            .map_err(cas_error("franchisee", current.id))
    }

    pub async fn find_deduction<C: ConnectionTrait>(
        db_connection: &C,
        idempotency_key: &str,
    ) -> Result<Option<franchisee_deduction::Model>> {
        Ok(FranchiseeDeduction::find()
            .filter(franchisee_deduction::Column::IdempotencyKey.eq(idempotency_key))
            .one(db_connection)
            .await?)
    }

    pub async fn record_deduction<C: ConnectionTrait>(
        db_connection: &C,
        franchisee_id: i32,
        order_id: i32,
        amount_cents: i64,
        idempotency_key: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<franchisee_deduction::Model> {
        let deduction = franchisee_deduction::ActiveModel {
            franchisee_id: Set(franchisee_id),
            order_id: Set(order_id),
            amount_cents: Set(amount_cents),
            idempotency_key: Set(idempotency_key.to_string()),
            reason: Set(reason.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(deduction.insert(db_connection).await?)
    }

    pub async fn update_deduction<C: ConnectionTrait>(
        db_connection: &C,
        deduction: franchisee_deduction::Model,
        amount_cents: i64,
        now: DateTime<Utc>,
    ) -> Result<franchisee_deduction::Model> {
        let mut active: franchisee_deduction::ActiveModel = deduction.into();
        active.amount_cents = Set(amount_cents);
        active.updated_at = Set(now);

        Ok(active.update(db_connection).await?)
    }
}
