use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Outbox Message - Transactional Outbox Row
// ============================================================================
//
// One row per integration event, inserted in the SAME unit of work as the
// stream append it announces (see StreamStore::append). Rows are never
// deleted - they stay behind for audit. Only the processor mutates them,
// and only the status columns.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Waiting for the processor to publish it
    Pending,
    /// Handed to the broker at least once
    Published,
    /// Retries exhausted - dead-lettered, needs operator attention
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub event_type: String,
    pub topic: String,
    pub partition_key: String,
    pub payload: String,
    pub status: OutboxStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

// ============================================================================
// Outbox Store - Durable Collaborator Interface
// ============================================================================
//
// Insertion happens through StreamStore::append so that state + notify is one
// atomic write. This trait covers the processor side: selection by status and
// the per-row outcome updates. A row is only ever mutated by the single
// processor loop, so status updates never contend.
//
// ============================================================================

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Pending rows with retries left, oldest first, at most `batch_size`.
    async fn fetch_pending(
        &self,
        batch_size: usize,
        max_retries: u32,
    ) -> anyhow::Result<Vec<OutboxMessage>>;

    async fn mark_published(&self, id: Uuid, published_at: DateTime<Utc>) -> anyhow::Result<()>;

    /// Record a failed publish attempt. Bumps retry_count, stores the error,
    /// and flips the row to Failed (terminal) once the ceiling is reached.
    /// Returns the resulting status.
    async fn record_failure(
        &self,
        id: Uuid,
        error: &str,
        max_retries: u32,
    ) -> anyhow::Result<OutboxStatus>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<OutboxMessage>>;
}
