use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::{
    Aggregate, Clock, CommandError, DomainEvent, EventEnvelope, EventStoreError, RecordedEvent,
    RehydrateError,
};
use crate::outbox::{OutboxMessage, OutboxService};

// ============================================================================
// Stream Store - Durable Collaborator Interface
// ============================================================================
//
// The single consistency gate for all aggregate writes. Implementations must
// guarantee:
//
// 1. append is atomic - either every event (and outbox row) lands, or none
// 2. the expected-version check and the write happen as one step, so two
//    concurrent appends with the same expected version produce exactly one
//    winner and one ConcurrencyConflict
// 3. events_since returns durable write order, not per-aggregate order
//
// The concrete storage engine is out of scope here; tests and the demo use
// the in-memory backend in memory.rs.
//
// ============================================================================

#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append `events` to one aggregate's stream iff its current version
    /// equals `expected_version`, inserting `outbox_rows` in the same unit
    /// of work. Returns the new stream version.
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<RecordedEvent>,
        outbox_rows: Vec<OutboxMessage>,
    ) -> Result<i64, EventStoreError>;

    /// Full replay list, oldest first. Empty means the aggregate does not
    /// exist yet.
    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Prefix of the stream with occurred_at <= as_of (time travel).
    async fn events_for_until(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Cross-aggregate feed in global write order, strictly after
    /// `global_sequence`, at most `limit` events.
    async fn events_since(
        &self,
        global_sequence: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, EventStoreError>;

    /// Current stream version; 0 for unknown aggregates.
    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError>;
}

// ============================================================================
// Typed Event Store - Generic over the Domain Event
// ============================================================================
//
// Wraps the durable store for ONE aggregate type: serializes envelopes on the
// way in, rehydrates aggregates on the way out, and builds the outbox rows
// that ride along inside the append.
//
// ============================================================================

pub struct EventStore<E: DomainEvent> {
    store: Arc<dyn StreamStore>,
    outbox: OutboxService,
    clock: Arc<dyn Clock>,
    aggregate_type: String, // e.g. "Sale", "Customer", "Product"
    _phantom: PhantomData<E>,
}

impl<E: DomainEvent> EventStore<E> {
    pub fn new(
        store: Arc<dyn StreamStore>,
        clock: Arc<dyn Clock>,
        aggregate_type: &str,
        topic: &str,
    ) -> Self {
        Self {
            store,
            outbox: OutboxService::new(topic, clock.clone()),
            clock,
            aggregate_type: aggregate_type.to_string(),
            _phantom: PhantomData,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Append events with an optimistic version check. When
    /// `publish_to_outbox` is set, one Pending outbox row per event lands in
    /// the same unit of work.
    pub async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<EventEnvelope<E>>,
        publish_to_outbox: bool,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::EmptyAppend);
        }

        let mut recorded = Vec::with_capacity(events.len());
        let mut outbox_rows = Vec::new();

        for envelope in &events {
            let record = RecordedEvent::from_envelope(envelope, &self.aggregate_type)?;
            if publish_to_outbox {
                outbox_rows.push(self.outbox.enqueue(&record));
            }
            recorded.push(record);
        }

        let new_version = self
            .store
            .append(aggregate_id, expected_version, recorded, outbox_rows)
            .await?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %self.aggregate_type,
            new_version,
            event_count = events.len(),
            "Appended events to stream"
        );

        Ok(new_version)
    }

    /// Load all events for an aggregate, oldest first.
    pub async fn load_events(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Vec<EventEnvelope<E>>, EventStoreError> {
        let recorded = self.store.events_for(aggregate_id).await?;
        recorded
            .iter()
            .map(|r| r.to_envelope().map_err(EventStoreError::Backend))
            .collect()
    }

    /// Load the stream truncated to events with occurred_at <= as_of.
    pub async fn load_events_until(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<EventEnvelope<E>>, EventStoreError> {
        let recorded = self.store.events_for_until(aggregate_id, as_of).await?;
        recorded
            .iter()
            .map(|r| r.to_envelope().map_err(EventStoreError::Backend))
            .collect()
    }

    pub async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        self.store.current_version(aggregate_id).await
    }

    pub async fn aggregate_exists(&self, aggregate_id: Uuid) -> Result<bool, EventStoreError> {
        Ok(self.current_version(aggregate_id).await? > 0)
    }

    /// Rehydrate current state from the full stream.
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<A, CommandError>
    where
        A: Aggregate<Event = E>,
    {
        let events = self
            .load_events(aggregate_id)
            .await
            .map_err(CommandError::from_store)?;
        Self::rehydrate_or_not_found(aggregate_id, &events)
    }

    /// Rehydrate the state the aggregate had at `as_of` ("time travel").
    /// The stored stream is never mutated; this only folds a prefix.
    pub async fn load_aggregate_at<A>(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<A, CommandError>
    where
        A: Aggregate<Event = E>,
    {
        let events = self
            .load_events_until(aggregate_id, as_of)
            .await
            .map_err(CommandError::from_store)?;
        Self::rehydrate_or_not_found(aggregate_id, &events)
    }

    fn rehydrate_or_not_found<A>(
        aggregate_id: Uuid,
        events: &[EventEnvelope<E>],
    ) -> Result<A, CommandError>
    where
        A: Aggregate<Event = E>,
    {
        A::rehydrate(events).map_err(|e| match e {
            RehydrateError::EmptyStream => CommandError::NotFound(aggregate_id),
            RehydrateError::CorruptStream(msg) => {
                CommandError::Internal(anyhow::anyhow!("corrupt stream {aggregate_id}: {msg}"))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sale::{
        SaleAggregate, SaleEvent, SaleLine, SaleLineAdded, SaleStarted,
    };
    use crate::event_sourcing::core::SystemClock;
    use crate::event_sourcing::store::InMemoryStore;
    use chrono::{Duration, Utc};

    fn sale_store(store: Arc<InMemoryStore>) -> EventStore<SaleEvent> {
        EventStore::new(store, Arc::new(SystemClock), "Sale", "sale-events")
    }

    fn envelope(
        sale_id: Uuid,
        version: i64,
        event: SaleEvent,
        occurred_at: DateTime<Utc>,
    ) -> EventEnvelope<SaleEvent> {
        EventEnvelope::new(
            sale_id,
            version,
            event.event_type().to_string(),
            event,
            Uuid::new_v4(),
            occurred_at,
        )
    }

    #[tokio::test]
    async fn test_load_aggregate_at_folds_only_the_prefix() {
        let backend = Arc::new(InMemoryStore::new());
        let store = sale_store(backend.clone());
        let sale_id = Uuid::new_v4();

        let yesterday = Utc::now() - Duration::days(1);
        let today = Utc::now();

        store
            .append_events(
                sale_id,
                0,
                vec![envelope(
                    sale_id,
                    1,
                    SaleEvent::Started(SaleStarted {
                        sale_id,
                        customer_id: Uuid::new_v4(),
                    }),
                    yesterday,
                )],
                false,
            )
            .await
            .unwrap();
        store
            .append_events(
                sale_id,
                1,
                vec![envelope(
                    sale_id,
                    2,
                    SaleEvent::LineAdded(SaleLineAdded {
                        line: SaleLine {
                            product_id: Uuid::new_v4(),
                            quantity: 2,
                            unit_price_cents: 400,
                        },
                    }),
                    today,
                )],
                false,
            )
            .await
            .unwrap();

        let past: SaleAggregate = store
            .load_aggregate_at(sale_id, yesterday + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(past.version, 1);
        assert!(past.lines.is_empty());

        // Folding the prefix never touches the stored stream
        let current: SaleAggregate = store.load_aggregate(sale_id).await.unwrap();
        assert_eq!(current.version, 2);
        assert_eq!(current.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_load_aggregate_at_before_creation_is_not_found() {
        let backend = Arc::new(InMemoryStore::new());
        let store = sale_store(backend);
        let sale_id = Uuid::new_v4();

        store
            .append_events(
                sale_id,
                0,
                vec![envelope(
                    sale_id,
                    1,
                    SaleEvent::Started(SaleStarted {
                        sale_id,
                        customer_id: Uuid::new_v4(),
                    }),
                    Utc::now(),
                )],
                false,
            )
            .await
            .unwrap();

        let result: Result<SaleAggregate, _> = store
            .load_aggregate_at(sale_id, Utc::now() - Duration::days(2))
            .await;
        assert!(matches!(result, Err(CommandError::NotFound(id)) if id == sale_id));
    }

    #[tokio::test]
    async fn test_empty_append_is_rejected() {
        let backend = Arc::new(InMemoryStore::new());
        let store = sale_store(backend);

        let result = store
            .append_events(Uuid::new_v4(), 0, Vec::new(), true)
            .await;
        assert!(matches!(result, Err(EventStoreError::EmptyAppend)));
    }
}
