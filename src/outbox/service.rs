use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{Clock, RecordedEvent};

use super::message::{OutboxMessage, OutboxStatus};

// ============================================================================
// Outbox Service - Builds Rows Inside the Unit of Work
// ============================================================================
//
// Converts "write state + notify" into one atomic operation: the typed event
// store asks this service for a row per appended event and hands the rows to
// StreamStore::append, which persists both in the same batch. That is the
// whole trick that avoids the dual-write problem.
//
// ============================================================================

pub struct OutboxService {
    topic: String,
    clock: Arc<dyn Clock>,
}

impl OutboxService {
    pub fn new(topic: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            topic: topic.to_string(),
            clock,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Build a Pending row announcing `recorded`. The aggregate id doubles
    /// as the partition key so one aggregate's events stay in broker order.
    pub fn enqueue(&self, recorded: &RecordedEvent) -> OutboxMessage {
        OutboxMessage {
            id: Uuid::new_v4(),
            event_id: recorded.event_id,
            aggregate_id: recorded.aggregate_id,
            event_type: recorded.event_type.clone(),
            topic: self.topic.clone(),
            partition_key: recorded.aggregate_id.to_string(),
            payload: recorded.payload.clone(),
            status: OutboxStatus::Pending,
            retry_count: 0,
            created_at: self.clock.now(),
            published_at: None,
            last_error: None,
        }
    }
}
