use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::event_sourcing::core::{EventStoreError, RecordedEvent};
use crate::outbox::{OutboxMessage, OutboxStatus, OutboxStore};
use crate::projection::CheckpointStore;
use crate::saga::{SagaState, SagaStateStore};

use super::event_store::StreamStore;

// ============================================================================
// In-Memory Backend
// ============================================================================
//
// One backend implements the stream store, outbox table, projection
// checkpoint and saga state store behind a single mutex, which is what makes
// the append unit of work (events + outbox rows + version bump) atomic - the
// same role the real storage engine's transaction would play. Used by tests
// and the demo binary.
//
// ============================================================================

#[derive(Default)]
struct Inner {
    /// Global log in durable write order; global_sequence = index + 1
    log: Vec<RecordedEvent>,
    /// Current stream version per aggregate
    versions: HashMap<Uuid, i64>,
    outbox: Vec<OutboxMessage>,
    checkpoints: HashMap<String, i64>,
    sagas: HashMap<Uuid, SagaState>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of outbox rows ever written (audit view, never shrinks).
    pub async fn outbox_len(&self) -> usize {
        self.inner.lock().await.outbox.len()
    }

    pub async fn outbox_rows(&self) -> Vec<OutboxMessage> {
        self.inner.lock().await.outbox.clone()
    }
}

#[async_trait]
impl StreamStore for InMemoryStore {
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: Vec<RecordedEvent>,
        outbox_rows: Vec<OutboxMessage>,
    ) -> Result<i64, EventStoreError> {
        if events.is_empty() {
            return Err(EventStoreError::EmptyAppend);
        }

        let mut inner = self.inner.lock().await;

        // Version check and write happen under the same lock: exactly one
        // of two racing appends can pass this gate.
        let current = inner.versions.get(&aggregate_id).copied().unwrap_or(0);
        if current != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current,
            });
        }

        let mut new_version = expected_version;
        for mut event in events {
            new_version += 1;
            event.stream_version = new_version;
            event.global_sequence = inner.log.len() as i64 + 1;
            inner.log.push(event);
        }

        inner.versions.insert(aggregate_id, new_version);
        inner.outbox.extend(outbox_rows);

        Ok(new_version)
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn events_for_until(
        &self,
        aggregate_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.occurred_at <= as_of)
            .cloned()
            .collect())
    }

    async fn events_since(
        &self,
        global_sequence: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.global_sequence > global_sequence)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn current_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.versions.get(&aggregate_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn fetch_pending(
        &self,
        batch_size: usize,
        max_retries: u32,
    ) -> anyhow::Result<Vec<OutboxMessage>> {
        let inner = self.inner.lock().await;

        let mut pending: Vec<OutboxMessage> = inner
            .outbox
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending && m.retry_count < max_retries)
            .cloned()
            .collect();

        pending.sort_by_key(|m| m.created_at);
        pending.truncate(batch_size);

        Ok(pending)
    }

    async fn mark_published(&self, id: Uuid, published_at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow::anyhow!("no outbox row {id}"))?;

        row.status = OutboxStatus::Published;
        row.published_at = Some(published_at);
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: u32,
    ) -> anyhow::Result<OutboxStatus> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .outbox
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| anyhow::anyhow!("no outbox row {id}"))?;

        row.retry_count += 1;
        row.last_error = Some(error.to_string());
        if row.retry_count >= max_retries {
            row.status = OutboxStatus::Failed;
        }

        Ok(row.status)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<OutboxMessage>> {
        let inner = self.inner.lock().await;
        Ok(inner.outbox.iter().find(|m| m.id == id).cloned())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn load(&self, name: &str) -> anyhow::Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.checkpoints.get(name).copied().unwrap_or(0))
    }

    async fn save(&self, name: &str, global_sequence: i64) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.checkpoints.insert(name.to_string(), global_sequence);
        Ok(())
    }
}

#[async_trait]
impl SagaStateStore for InMemoryStore {
    async fn load(&self, saga_id: Uuid) -> anyhow::Result<Option<SagaState>> {
        let inner = self.inner.lock().await;
        Ok(inner.sagas.get(&saga_id).cloned())
    }

    async fn save(&self, state: &SagaState) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        inner.sagas.insert(state.saga_id, state.clone());
        Ok(())
    }
}
