use std::sync::Arc;
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

use super::core::{Aggregate, CommandError, DomainEvent, EventEnvelope, EventStoreError};
use super::store::EventStore;

// ============================================================================
// Command Handler - Command → Aggregate → Events → Store
// ============================================================================
//
// One generic handler drives every aggregate: rehydrate current state, let
// the aggregate decide, wrap the new facts in envelopes and append them with
// the expected-version check. A ConcurrencyConflict means somebody else won
// the race - reload and retry a bounded number of times, then surface it.
// Invariant violations and NotFound are never retried.
//
// ============================================================================

pub struct CommandHandler<A: Aggregate>
where
    A::Event: DomainEvent,
{
    event_store: Arc<EventStore<A::Event>>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl<A> CommandHandler<A>
where
    A: Aggregate,
    A::Event: DomainEvent,
    A::Command: Clone + Send + Sync,
{
    pub fn new(event_store: Arc<EventStore<A::Event>>, metrics: Arc<Metrics>) -> Self {
        Self {
            event_store,
            retry: RetryConfig::default(),
            metrics,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Handle a command and persist the resulting events.
    /// Returns the stream version after the append (unchanged when the
    /// aggregate decided the command was an idempotent repeat).
    pub async fn handle(
        &self,
        aggregate_id: Uuid,
        command: A::Command,
        correlation_id: Uuid,
    ) -> Result<i64, CommandError> {
        let result = retry_on_transient(self.retry.clone(), |_attempt| {
            let command = command.clone();
            async move {
                self.attempt(aggregate_id, &command, correlation_id).await
            }
        })
        .await;

        match result {
            RetryResult::Success(version) => Ok(version),
            RetryResult::Failed(e) | RetryResult::PermanentFailure(e) => Err(e),
        }
    }

    async fn attempt(
        &self,
        aggregate_id: Uuid,
        command: &A::Command,
        correlation_id: Uuid,
    ) -> Result<i64, CommandError> {
        let expected_version = self
            .event_store
            .current_version(aggregate_id)
            .await
            .map_err(CommandError::from_store)?;

        // Zero events means the aggregate does not exist yet: only a
        // creation command is valid, anything else is NotFound (not an
        // invariant violation - callers treat the two differently).
        let new_events = if expected_version == 0 {
            if !A::is_creation_command(command) {
                return Err(CommandError::NotFound(aggregate_id));
            }
            A::handle_create(command)
                .map_err(|e| CommandError::InvariantViolation(e.to_string()))?
        } else {
            let aggregate: A = self.event_store.load_aggregate(aggregate_id).await?;
            aggregate
                .handle(command)
                .map_err(|e| CommandError::InvariantViolation(e.to_string()))?
        };

        // Idempotent repeat: nothing new happened
        if new_events.is_empty() {
            tracing::debug!(
                aggregate_id = %aggregate_id,
                aggregate_type = self.event_store.aggregate_type(),
                "Command was an idempotent repeat, no events emitted"
            );
            return Ok(expected_version);
        }

        let occurred_at = self.event_store.clock().now();
        let mut envelopes = Vec::with_capacity(new_events.len());
        let mut stream_version = expected_version;

        for event in new_events {
            stream_version += 1;
            envelopes.push(EventEnvelope::new(
                aggregate_id,
                stream_version,
                event.event_type().to_string(),
                event,
                correlation_id,
                occurred_at,
            ));
        }

        match self
            .event_store
            .append_events(aggregate_id, expected_version, envelopes, true)
            .await
        {
            Ok(new_version) => Ok(new_version),
            Err(err) => {
                if matches!(err, EventStoreError::ConcurrencyConflict { .. }) {
                    self.metrics
                        .concurrency_conflicts
                        .with_label_values(&[self.event_store.aggregate_type()])
                        .inc();
                }
                Err(CommandError::from_store(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sale::{SaleCommand, SaleCommandHandler, SaleEvent, SaleLine};
    use crate::event_sourcing::core::SystemClock;
    use crate::event_sourcing::store::event_store::StreamStore;
    use crate::event_sourcing::store::InMemoryStore;
    use crate::metrics::Metrics;

    fn handler(store: Arc<InMemoryStore>) -> SaleCommandHandler {
        let event_store = Arc::new(EventStore::<SaleEvent>::new(
            store,
            Arc::new(SystemClock),
            "Sale",
            "sale-events",
        ));
        SaleCommandHandler::new(event_store, Arc::new(Metrics::new().unwrap()))
    }

    fn start(sale_id: Uuid) -> SaleCommand {
        SaleCommand::StartSale {
            sale_id,
            customer_id: Uuid::new_v4(),
        }
    }

    fn add_line(quantity: i32) -> SaleCommand {
        SaleCommand::AddLine {
            line: SaleLine {
                product_id: Uuid::new_v4(),
                quantity,
                unit_price_cents: 250,
            },
        }
    }

    #[tokio::test]
    async fn test_creation_command_starts_a_stream() {
        let store = Arc::new(InMemoryStore::new());
        let handler = handler(store.clone());
        let sale_id = Uuid::new_v4();

        let version = handler
            .handle(sale_id, start(sale_id), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(version, 1);
        // One outbox row rode along with the append
        assert_eq!(store.outbox_len().await, 1);
    }

    #[tokio::test]
    async fn test_command_against_missing_aggregate_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let handler = handler(store);
        let sale_id = Uuid::new_v4();

        let result = handler.handle(sale_id, add_line(1), Uuid::new_v4()).await;
        assert!(matches!(result, Err(CommandError::NotFound(id)) if id == sale_id));
    }

    #[tokio::test]
    async fn test_repeated_creation_is_an_invariant_violation() {
        let store = Arc::new(InMemoryStore::new());
        let handler = handler(store);
        let sale_id = Uuid::new_v4();

        handler
            .handle(sale_id, start(sale_id), Uuid::new_v4())
            .await
            .unwrap();
        let result = handler
            .handle(sale_id, start(sale_id), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(CommandError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_invalid_command_appends_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let handler = handler(store.clone());
        let sale_id = Uuid::new_v4();

        handler
            .handle(sale_id, start(sale_id), Uuid::new_v4())
            .await
            .unwrap();
        let result = handler
            .handle(sale_id, add_line(-2), Uuid::new_v4())
            .await;

        assert!(matches!(result, Err(CommandError::InvariantViolation(_))));
        assert_eq!(store.current_version(sale_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_idempotent_repeat_returns_unchanged_version() {
        let store = Arc::new(InMemoryStore::new());
        let handler = handler(store.clone());
        let sale_id = Uuid::new_v4();

        handler
            .handle(sale_id, start(sale_id), Uuid::new_v4())
            .await
            .unwrap();
        handler
            .handle(sale_id, add_line(2), Uuid::new_v4())
            .await
            .unwrap();
        let finalized = handler
            .handle(sale_id, SaleCommand::FinalizeSale, Uuid::new_v4())
            .await
            .unwrap();

        // Redelivered finalize emits no events and keeps the version
        let repeated = handler
            .handle(sale_id, SaleCommand::FinalizeSale, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(finalized, 3);
        assert_eq!(repeated, 3);
        assert_eq!(store.current_version(sale_id).await.unwrap(), 3);
        assert_eq!(store.outbox_len().await, 3);
    }
}
