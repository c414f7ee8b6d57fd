use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};

use crate::{
    error::Result,
    infrastructure::db::entities::{
        OrderEvent,
        order::{self, OrderStatus},
        order_event,
    },
};

pub struct EventRepository;

impl EventRepository {
    pub async fn append<C: ConnectionTrait>(
        db_connection: &C,
        order: &order::Model,
        from: OrderStatus,
        to: OrderStatus,
        trigger: &str,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<order_event::Model> {
        let event = order_event::ActiveModel {
            order_id: Set(order.id),
            order_number: Set(order.order_number.clone()),
            from_status: Set(from.as_str().to_string()),
            to_status: Set(to.as_str().to_string()),
            trigger: Set(trigger.to_string()),
            actor: Set(actor.to_string()),
            at: Set(at),
            ..Default::default()
        };

        Ok(event.insert(db_connection).await?)
    }

    pub async fn list_for_order<C: ConnectionTrait>(
        db_connection: &C,
        order_id: i32,
    ) -> Result<Vec<order_event::Model>> {
        Ok(OrderEvent::find()
            .filter(order_event::Column::OrderId.eq(order_id))
            .order_by_asc(order_event::Column::Id)
            .all(db_connection)
            .await?)
    }
}
