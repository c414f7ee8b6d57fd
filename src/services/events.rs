use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::{
    AppState,
    error::Result,
    infrastructure::db::{
        entities::{order::OrderStatus, order_event},
        repositories::EventRepository,
    },
};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Transition {
        order_id: i32,
        order_number: String,
        from: OrderStatus,
        to: OrderStatus,
        trigger: String,
        actor: String,
        at: DateTime<Utc>,
    },
    RefundRequested {
        order_id: i32,
        order_number: String,
        amount_cents: i64,
        reason: Option<String>,
    },
    ManualReview {
        order_id: i32,
        reason: String,
    },
}

/// In-process fan-out of appended order events.
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: DomainEvent) {
        tracing::debug!(event = ?event, "Domain event");
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

/// The order's persisted history, oldest first.
pub async fn events_for_order(state: &AppState, order_id: i32) -> Result<Vec<order_event::Model>> {
    EventRepository::list_for_order(state.db.get_connection(), order_id).await
}
