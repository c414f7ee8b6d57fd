use sea_orm::{
    ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QuerySelect, Select,
};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    infrastructure::db::{
        LockingMode,
        entities::{AiTask, Coupon, Franchisee, Order, ai_task, coupon, franchisee, order},
    },
};

/// One transaction plus the locking discipline of the store behind it.
///
/// Reads through the `*_for_update` accessors take a row lock when the store
/// supports it. Writes go through the repositories' CAS saves either way.
pub struct UnitOfWork {
    transaction: DatabaseTransaction,
    lock_mode: LockingMode,
}

impl UnitOfWork {
    pub(crate) fn new(transaction: DatabaseTransaction, lock_mode: LockingMode) -> Self {
        Self {
            transaction,
            lock_mode,
        }
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.transaction
    }

    pub fn lock_mode(&self) -> LockingMode {
        self.lock_mode
    }

    fn locked<E: EntityTrait>(&self, select: Select<E>) -> Select<E> {
        match self.lock_mode {
            LockingMode::RowLock => select.lock_exclusive(),
            LockingMode::VersionCas => select,
        }
    }

    pub async fn order_for_update(&self, id: i32) -> Result<order::Model> {
        self.locked(Order::find_by_id(id))
            .one(&self.transaction)
            .await?
            .ok_or(AppError::OrderNotFound)
    }

    pub async fn order_by_number_for_update(
        &self,
        order_number: &str,
    ) -> Result<Option<order::Model>> {
        Ok(self
            .locked(Order::find().filter(order::Column::OrderNumber.eq(order_number)))
            .one(&self.transaction)
            .await?)
    }

    pub async fn task_for_update(&self, id: Uuid) -> Result<ai_task::Model> {
        self.locked(AiTask::find_by_id(id))
            .one(&self.transaction)
            .await?
            .ok_or(AppError::TaskNotFound)
    }

    pub async fn franchisee_for_update(&self, id: i32) -> Result<franchisee::Model> {
        self.locked(Franchisee::find_by_id(id))
            .one(&self.transaction)
            .await?
            .ok_or(AppError::FranchiseeNotFound)
    }

    pub async fn coupon_for_update(&self, code: &str) -> Result<coupon::Model> {
        self.locked(Coupon::find().filter(coupon::Column::Code.eq(code)))
            .one(&self.transaction)
            .await?
            .ok_or(AppError::CouponNotFound)
    }

    pub async fn commit(self) -> Result<()> {
        Ok(self.transaction.commit().await?)
    }

    pub async fn rollback(self) -> Result<()> {
        Ok(self.transaction.rollback().await?)
    }
}
