use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::events::DomainEvent;
use crate::domain::ports::EventPublisher;
use crate::schema::commerce_outbox;

use super::models::NewOutboxEventRow;

/// Appends events to `commerce_outbox`, where CDC relays them to the broker.
/// The topic is derived from `aggregate_type` by the relay's router.
pub struct OutboxEventPublisher {
    pool: DbPool,
}

impl OutboxEventPublisher {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn outbox_row(event: &DomainEvent) -> Result<NewOutboxEventRow, DomainError> {
    Ok(NewOutboxEventRow {
        id: Uuid::new_v4(),
        aggregate_type: event.aggregate_type().to_string(),
        aggregate_id: event.aggregate_id().to_string(),
        event_type: event.event_type().to_string(),
        payload: serde_json::to_value(event).map_err(|e| DomainError::Internal(e.to_string()))?,
    })
}

impl EventPublisher for OutboxEventPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(commerce_outbox::table)
            .values(&outbox_row(event)?)
            .execute(&mut conn)?;
        Ok(())
    }
}
