use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::event_sourcing::core::Clock;
use crate::messaging::MessagePublisher;
use crate::metrics::Metrics;

use super::message::{OutboxStatus, OutboxStore};

// ============================================================================
// Outbox Processor - Background Publisher
// ============================================================================
//
// Polls the outbox table on a fixed interval and pushes Pending rows to the
// broker, oldest first. Per row:
//
// - publish succeeds  -> mark Published with published_at
// - publish fails     -> bump retry_count, store the error; once the retry
//                        ceiling is hit the row flips to Failed (terminal,
//                        dead-lettered, reported via metrics and logs)
//
// Delivery is at-least-once: a crash between publish and the status update
// replays the row on the next tick. Consumers dedupe by event id. Publish
// failures never reach the original caller - the business write already
// committed.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct OutboxProcessorConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for OutboxProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            batch_size: 50,
            max_retries: 5,
        }
    }
}

pub struct OutboxProcessor {
    outbox: Arc<dyn OutboxStore>,
    publisher: Arc<dyn MessagePublisher>,
    clock: Arc<dyn Clock>,
    config: OutboxProcessorConfig,
    metrics: Arc<Metrics>,
}

impl OutboxProcessor {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        publisher: Arc<dyn MessagePublisher>,
        clock: Arc<dyn Clock>,
        config: OutboxProcessorConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            outbox,
            publisher,
            clock,
            config,
            metrics,
        }
    }

    /// One polling pass. Returns how many rows were published.
    pub async fn tick(&self) -> anyhow::Result<usize> {
        let batch = self
            .outbox
            .fetch_pending(self.config.batch_size, self.config.max_retries)
            .await?;

        if batch.is_empty() {
            return Ok(0);
        }

        tracing::debug!(rows = batch.len(), "Fetched pending outbox rows");

        let mut published = 0;

        for row in batch {
            // The event id is the broker key consumers dedupe on
            match self
                .publisher
                .publish(&row.topic, &row.event_id.to_string(), &row.payload)
                .await
            {
                Ok(()) => {
                    self.outbox.mark_published(row.id, self.clock.now()).await?;
                    self.metrics
                        .outbox_published
                        .with_label_values(&[&row.event_type])
                        .inc();
                    published += 1;

                    tracing::info!(
                        event_id = %row.event_id,
                        event_type = %row.event_type,
                        topic = %row.topic,
                        "Published outbox row"
                    );
                }
                Err(e) => {
                    let status = self
                        .outbox
                        .record_failure(row.id, &e.to_string(), self.config.max_retries)
                        .await?;
                    self.metrics
                        .outbox_publish_failures
                        .with_label_values(&[&row.event_type])
                        .inc();

                    if status == OutboxStatus::Failed {
                        self.metrics
                            .outbox_dead_lettered
                            .with_label_values(&[&row.event_type])
                            .inc();
                        tracing::error!(
                            event_id = %row.event_id,
                            event_type = %row.event_type,
                            error = %e,
                            "Outbox row dead-lettered after exhausting retries"
                        );
                    } else {
                        tracing::warn!(
                            event_id = %row.event_id,
                            event_type = %row.event_type,
                            error = %e,
                            "Publish failed, will retry on a later tick"
                        );
                    }
                }
            }
        }

        Ok(published)
    }

    /// Fixed-interval polling loop. Exits when the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis(),
            batch_size = self.config.batch_size,
            max_retries = self.config.max_retries,
            "Outbox processor started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Outbox pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Outbox processor shutting down");
                        return;
                    }
                }
            }
        }
    }
}
