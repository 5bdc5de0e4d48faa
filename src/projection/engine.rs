use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::event_sourcing::core::RecordedEvent;
use crate::event_sourcing::store::StreamStore;
use crate::metrics::Metrics;

// ============================================================================
// Projection Engine - Checkpoint-Driven Read Model Materialization
// ============================================================================
//
// Polls the global event feed on a fixed interval, folds each event into
// every registered projection, and advances the checkpoint only after the
// whole batch is durably applied. A crash mid-batch means the next run
// re-processes from the last durable checkpoint, so projections MUST be
// idempotent per event id (upsert by natural key or track applied ids).
//
// Ordering: the global feed preserves per-aggregate stream_version order;
// nothing is guaranteed across aggregates and nothing here assumes it.
//
// ============================================================================

const CHECKPOINT_NAME: &str = "projection-engine-v1";

/// Durable cursor into the global event feed (collaborator interface).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Last durably processed global sequence; 0 if never advanced.
    async fn load(&self, name: &str) -> anyhow::Result<i64>;
    async fn save(&self, name: &str, global_sequence: i64) -> anyhow::Result<()>;
}

/// A read model fed from the event stream.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fold one event into the read model. Must be idempotent per
    /// event_id - the same event WILL show up again after a crash.
    async fn apply(&self, event: &RecordedEvent) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct ProjectionConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 100,
        }
    }
}

pub struct ProjectionEngine {
    store: Arc<dyn StreamStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    projections: Vec<Arc<dyn Projection>>,
    config: ProjectionConfig,
    metrics: Arc<Metrics>,
}

impl ProjectionEngine {
    pub fn new(
        store: Arc<dyn StreamStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: ProjectionConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            checkpoints,
            projections: Vec::new(),
            config,
            metrics,
        }
    }

    pub fn register(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    /// One polling pass: apply everything after the checkpoint, up to
    /// `max_batch` events, then advance the checkpoint. Returns how many
    /// events were processed.
    pub async fn process_pending(&self, max_batch: usize) -> anyhow::Result<usize> {
        let checkpoint = self.checkpoints.load(CHECKPOINT_NAME).await?;
        let events = self.store.events_since(checkpoint, max_batch).await?;

        if events.is_empty() {
            return Ok(0);
        }

        for event in &events {
            for projection in &self.projections {
                projection.apply(event).await?;
                self.metrics
                    .projection_events_applied
                    .with_label_values(&[projection.name()])
                    .inc();
            }

            tracing::debug!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                global_sequence = event.global_sequence,
                "Applied event to projections"
            );
        }

        // Checkpoint moves only after the whole batch landed. Crash before
        // this line and the batch replays; that is what idempotency is for.
        let last = events
            .last()
            .map(|e| e.global_sequence)
            .unwrap_or(checkpoint);
        self.checkpoints.save(CHECKPOINT_NAME, last).await?;
        self.metrics.projection_checkpoint.set(last);

        tracing::info!(
            processed = events.len(),
            checkpoint = last,
            "Advanced projection checkpoint"
        );

        Ok(events.len())
    }

    /// Fixed-interval polling loop. Exits when the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis(),
            batch_size = self.config.batch_size,
            projections = self.projections.len(),
            "Projection engine started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.process_pending(self.config.batch_size).await {
                        tracing::error!(error = %e, "Projection pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Projection engine shutting down");
                        return;
                    }
                }
            }
        }
    }
}
