use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::{
    error::{AppError, Result},
    infrastructure::db::entities::{PrinterDispatch, order, printer_dispatch},
};

pub struct PrinterDispatchRepository;

impl PrinterDispatchRepository {
    pub async fn find_by_order<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Option<printer_dispatch::Model>> {
        PrinterDispatch::find()
            .filter(printer_dispatch::Column::OrderId.eq(order_id))
            .one(db_connection)
            .await
            .map_err(AppError::DatabaseError)
    }

    /// One dispatch record per order, keyed by the order's external key.
    pub async fn find_or_create<C: ConnectionTrait>(
        db_connection: &C,
        order: &order::Model,
        now: DateTime<Utc>,
    ) -> Result<printer_dispatch::Model> {
        if let Some(existing) = Self::find_by_order(db_connection, order.id).await? {
            return Ok(existing);
        }

        let dispatch = printer_dispatch::ActiveModel {
            order_id: Set(order.id),
            external_key: Set(order.external_key()),
            attempt_count: Set(0),
            last_attempt_at: Set(None),
            next_retry_at: Set(None),
            succeeded_at: Set(None),
            last_error: Set(None),
            response_data: Set(None),
            cancel_forwarded_at: Set(None),
            cancel_acknowledged_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(dispatch.insert(db_connection).await?)
    }

    pub async fn update<C, F>(
        db_connection: &C,
        dispatch: printer_dispatch::Model,
        now: DateTime<Utc>,
        updater: F,
    ) -> Result<printer_dispatch::Model>
    where
        C: ConnectionTrait,
        F: FnOnce(&mut printer_dispatch::ActiveModel),
    {
        let mut active: printer_dispatch::ActiveModel = dispatch.into();
        updater(&mut active);
        active.updated_at = Set(now);

        Ok(active.update(db_connection).await?)
    }

    /// Failed dispatches whose retry time has come.
    pub async fn list_retry_due<C: ConnectionTrait>(
        db_connection: &C,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<printer_dispatch::Model>> {
        Ok(PrinterDispatch::find()
            .filter(printer_dispatch::Column::SucceededAt.is_null())
            .filter(printer_dispatch::Column::NextRetryAt.lte(now))
            .order_by_asc(printer_dispatch::Column::NextRetryAt)
            .limit(limit)
            .all(db_connection)
            .await?)
    }
}
