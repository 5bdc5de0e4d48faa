mod server;

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics - Prometheus Observability
// ============================================================================
//
// Asynchronous failures (publish failures, saga compensation) never reach the
// original caller, so these counters are how they become visible:
//
// - Outbox publish outcomes and dead letters
// - Projection throughput and checkpoint position
// - Concurrency conflicts hit by command handlers
// - Saga completions, compensations, and terminal failures
//
// Scraped via the /metrics endpoint (see server.rs).
//
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Outbox
    pub outbox_published: IntCounterVec,
    pub outbox_publish_failures: IntCounterVec,
    pub outbox_dead_lettered: IntCounterVec,

    // Projections
    pub projection_events_applied: IntCounterVec,
    pub projection_checkpoint: IntGauge,

    // Command handling
    pub concurrency_conflicts: IntCounterVec,

    // Sagas
    pub saga_completed: IntCounterVec,
    pub saga_compensated: IntCounterVec,
    pub saga_failed: IntCounterVec,
    pub saga_steps_executed: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let outbox_published = IntCounterVec::new(
            Opts::new("outbox_published_total", "Outbox rows successfully published"),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_published.clone()))?;

        let outbox_publish_failures = IntCounterVec::new(
            Opts::new("outbox_publish_failures_total", "Failed publish attempts"),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_publish_failures.clone()))?;

        let outbox_dead_lettered = IntCounterVec::new(
            Opts::new(
                "outbox_dead_lettered_total",
                "Outbox rows marked Failed after exhausting retries",
            ),
            &["event_type"],
        )?;
        registry.register(Box::new(outbox_dead_lettered.clone()))?;

        let projection_events_applied = IntCounterVec::new(
            Opts::new(
                "projection_events_applied_total",
                "Events folded into read models",
            ),
            &["projection"],
        )?;
        registry.register(Box::new(projection_events_applied.clone()))?;

        let projection_checkpoint = IntGauge::new(
            "projection_checkpoint",
            "Last durably processed global sequence",
        )?;
        registry.register(Box::new(projection_checkpoint.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new(
                "concurrency_conflicts_total",
                "Optimistic concurrency conflicts seen by command handlers",
            ),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        let saga_completed = IntCounterVec::new(
            Opts::new("saga_completed_total", "Sagas that ran all steps"),
            &["definition"],
        )?;
        registry.register(Box::new(saga_completed.clone()))?;

        let saga_compensated = IntCounterVec::new(
            Opts::new(
                "saga_compensated_total",
                "Sagas rolled back via compensation",
            ),
            &["definition"],
        )?;
        registry.register(Box::new(saga_compensated.clone()))?;

        let saga_failed = IntCounterVec::new(
            Opts::new(
                "saga_failed_total",
                "Sagas parked in Failed after a compensation error",
            ),
            &["definition"],
        )?;
        registry.register(Box::new(saga_failed.clone()))?;

        let saga_steps_executed = IntCounter::new(
            "saga_steps_executed_total",
            "Forward saga steps executed",
        )?;
        registry.register(Box::new(saga_steps_executed.clone()))?;

        Ok(Self {
            registry,
            outbox_published,
            outbox_publish_failures,
            outbox_dead_lettered,
            projection_events_applied,
            projection_checkpoint,
            concurrency_conflicts,
            saga_completed,
            saga_compensated,
            saga_failed,
            saga_steps_executed,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
