use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::event_sourcing::core::Clock;
use crate::metrics::Metrics;

use super::definition::{SagaContext, SagaDefinition};
use super::state::{SagaState, SagaStateStore, SagaStatus};

// ============================================================================
// Saga Orchestrator
// ============================================================================
//
// Drives registered definitions step by step and persists SagaState after
// EVERY transition, so a crash at any point can be resumed from durable
// state. Forward failure triggers compensation of the completed steps in
// reverse order; a compensation failure parks the saga in Failed for an
// operator, it is never retried automatically.
//
// ============================================================================

pub struct SagaOrchestrator {
    definitions: HashMap<String, Arc<SagaDefinition>>,
    store: Arc<dyn SagaStateStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl SagaOrchestrator {
    pub fn new(
        store: Arc<dyn SagaStateStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            definitions: HashMap::new(),
            store,
            clock,
            metrics,
        }
    }

    pub fn register(&mut self, definition: SagaDefinition) {
        tracing::info!(
            definition = %definition.name(),
            steps = definition.steps().len(),
            "Registered saga definition"
        );
        self.definitions
            .insert(definition.name().to_string(), Arc::new(definition));
    }

    /// Starts a new saga instance, or picks up the existing one when the
    /// trigger is redelivered. Returns the terminal status.
    pub async fn start(
        &self,
        saga_id: Uuid,
        definition_name: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<SagaStatus> {
        let definition = self.definition(definition_name)?;

        let state = match self.store.load(saga_id).await? {
            // Redelivered trigger: continue from persisted progress
            Some(existing) => existing,
            None => {
                let state = SagaState::new(saga_id, definition_name, payload, self.clock.now());
                self.store.save(&state).await?;
                state
            }
        };

        self.run(&definition, state).await
    }

    /// Continues a saga from its persisted state, e.g. after a crash.
    pub async fn resume(&self, saga_id: Uuid) -> anyhow::Result<SagaStatus> {
        let state = self
            .store
            .load(saga_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no persisted state for saga {saga_id}"))?;

        let definition = self.definition(&state.definition_name)?;

        tracing::info!(
            saga_id = %saga_id,
            definition = %state.definition_name,
            status = ?state.status,
            step_index = state.current_step_index,
            "Resuming saga from persisted state"
        );

        self.run(&definition, state).await
    }

    fn definition(&self, name: &str) -> anyhow::Result<Arc<SagaDefinition>> {
        self.definitions
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown saga definition '{name}'"))
    }

    async fn run(
        &self,
        definition: &SagaDefinition,
        mut state: SagaState,
    ) -> anyhow::Result<SagaStatus> {
        if state.status.is_terminal() {
            tracing::debug!(
                saga_id = %state.saga_id,
                status = ?state.status,
                "Saga already terminal, nothing to do"
            );
            return Ok(state.status);
        }

        // A crash mid-compensation resumes straight into rollback
        if state.status == SagaStatus::Compensating {
            return self.compensate(definition, state).await;
        }

        if state.status == SagaStatus::NotStarted {
            tracing::info!(
                saga_id = %state.saga_id,
                definition = %definition.name(),
                "Saga started"
            );
        }
        state.status = SagaStatus::Running;
        self.persist(&mut state).await?;

        let ctx = SagaContext {
            saga_id: state.saga_id,
            payload: state.context.clone(),
        };

        while state.current_step_index < definition.steps().len() {
            let step = &definition.steps()[state.current_step_index];
            self.metrics.saga_steps_executed.inc();

            match step.forward.execute(&ctx).await {
                Ok(()) => {
                    tracing::info!(
                        saga_id = %state.saga_id,
                        step = %step.name,
                        "Saga step completed"
                    );
                    state.completed_steps.push(step.name.clone());
                    state.current_step_index += 1;
                    self.persist(&mut state).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        saga_id = %state.saga_id,
                        step = %step.name,
                        error = %e,
                        "Saga step failed, compensating completed steps"
                    );
                    state.last_error = Some(format!("step '{}' failed: {e}", step.name));
                    state.status = SagaStatus::Compensating;
                    self.persist(&mut state).await?;
                    return self.compensate(definition, state).await;
                }
            }
        }

        state.status = SagaStatus::Completed;
        self.persist(&mut state).await?;
        self.metrics
            .saga_completed
            .with_label_values(&[definition.name()])
            .inc();

        tracing::info!(saga_id = %state.saga_id, "Saga completed");
        Ok(SagaStatus::Completed)
    }

    /// Undoes completed steps back to front, draining completed_steps so a
    /// crash mid-rollback resumes with only the outstanding ones.
    async fn compensate(
        &self,
        definition: &SagaDefinition,
        mut state: SagaState,
    ) -> anyhow::Result<SagaStatus> {
        let ctx = SagaContext {
            saga_id: state.saga_id,
            payload: state.context.clone(),
        };

        while let Some(step_name) = state.completed_steps.last().cloned() {
            let step = definition.step_named(&step_name).ok_or_else(|| {
                anyhow::anyhow!(
                    "persisted step '{step_name}' missing from definition '{}'",
                    definition.name()
                )
            })?;

            if let Some(compensation) = &step.compensation {
                if let Err(e) = compensation.execute(&ctx).await {
                    state.last_error =
                        Some(format!("compensation for '{step_name}' failed: {e}"));
                    state.status = SagaStatus::Failed;
                    self.persist(&mut state).await?;
                    self.metrics
                        .saga_failed
                        .with_label_values(&[definition.name()])
                        .inc();

                    tracing::error!(
                        saga_id = %state.saga_id,
                        step = %step_name,
                        error = %e,
                        "Compensation failed, saga parked for operator attention"
                    );
                    return Ok(SagaStatus::Failed);
                }

                tracing::info!(
                    saga_id = %state.saga_id,
                    step = %step_name,
                    "Compensated saga step"
                );
            } else {
                tracing::debug!(
                    saga_id = %state.saga_id,
                    step = %step_name,
                    "Step has no compensation, skipping"
                );
            }

            state.completed_steps.pop();
            self.persist(&mut state).await?;
        }

        state.status = SagaStatus::Compensated;
        self.persist(&mut state).await?;
        self.metrics
            .saga_compensated
            .with_label_values(&[definition.name()])
            .inc();

        tracing::info!(saga_id = %state.saga_id, "Saga compensated");
        Ok(SagaStatus::Compensated)
    }

    async fn persist(&self, state: &mut SagaState) -> anyhow::Result<()> {
        state.updated_at = self.clock.now();
        self.store.save(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::SystemClock;
    use crate::event_sourcing::store::InMemoryStore;
    use crate::saga::definition::{action, SagaAction, SagaStepError};
    use std::sync::Mutex;

    /// Records the order actions fire in, so tests can assert sequencing.
    #[derive(Default)]
    struct ActionLog(Mutex<Vec<String>>);

    impl ActionLog {
        fn record(&self, entry: &str) {
            self.0.lock().unwrap().push(entry.to_string());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    fn logged_action(log: Arc<ActionLog>, entry: &'static str) -> Arc<dyn SagaAction> {
        action(move |_ctx| {
            let log = log.clone();
            async move {
                log.record(entry);
                Ok(())
            }
        })
    }

    fn failing_action(log: Arc<ActionLog>, entry: &'static str) -> Arc<dyn SagaAction> {
        action(move |_ctx| {
            let log = log.clone();
            async move {
                log.record(entry);
                Err(SagaStepError::new("downstream rejected the request"))
            }
        })
    }

    fn orchestrator(store: Arc<InMemoryStore>) -> SagaOrchestrator {
        SagaOrchestrator::new(store, Arc::new(SystemClock), Arc::new(Metrics::new().unwrap()))
    }

    fn fulfillment_definition(
        log: Arc<ActionLog>,
        charge_fails: bool,
    ) -> SagaDefinition {
        let charge = if charge_fails {
            failing_action(log.clone(), "charge-payment")
        } else {
            logged_action(log.clone(), "charge-payment")
        };

        SagaDefinition::new("sale-fulfillment")
            .compensated_step(
                "reserve-stock",
                logged_action(log.clone(), "reserve-stock"),
                logged_action(log.clone(), "release-stock"),
            )
            .compensated_step(
                "charge-payment",
                charge,
                logged_action(log.clone(), "refund-payment"),
            )
            .step("confirm-sale", logged_action(log, "confirm-sale"))
    }

    #[tokio::test]
    async fn test_happy_path_runs_all_steps_in_order() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(fulfillment_definition(log.clone(), false));

        let saga_id = Uuid::new_v4();
        let status = orchestrator
            .start(saga_id, "sale-fulfillment", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(status, SagaStatus::Completed);
        assert_eq!(
            log.entries(),
            vec!["reserve-stock", "charge-payment", "confirm-sale"]
        );

        let state = store.load(saga_id).await.unwrap().unwrap();
        assert_eq!(state.status, SagaStatus::Completed);
        assert_eq!(state.current_step_index, 3);
    }

    #[tokio::test]
    async fn test_step_failure_compensates_completed_steps_only() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(fulfillment_definition(log.clone(), true));

        let saga_id = Uuid::new_v4();
        let status = orchestrator
            .start(saga_id, "sale-fulfillment", serde_json::json!({}))
            .await
            .unwrap();

        // Charge failed, so only the stock reservation gets undone. The
        // refund never fires and confirm-sale is never reached.
        assert_eq!(status, SagaStatus::Compensated);
        assert_eq!(
            log.entries(),
            vec!["reserve-stock", "charge-payment", "release-stock"]
        );

        let state = store.load(saga_id).await.unwrap().unwrap();
        assert_eq!(state.status, SagaStatus::Compensated);
        assert!(state.completed_steps.is_empty());
        assert!(state.last_error.unwrap().contains("charge-payment"));
    }

    #[tokio::test]
    async fn test_compensation_runs_in_reverse_order() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());

        orchestrator.register(
            SagaDefinition::new("three-down")
                .compensated_step(
                    "first",
                    logged_action(log.clone(), "first"),
                    logged_action(log.clone(), "undo-first"),
                )
                .compensated_step(
                    "second",
                    logged_action(log.clone(), "second"),
                    logged_action(log.clone(), "undo-second"),
                )
                .compensated_step(
                    "third",
                    logged_action(log.clone(), "third"),
                    logged_action(log.clone(), "undo-third"),
                )
                .step("doomed", failing_action(log.clone(), "doomed")),
        );

        let status = orchestrator
            .start(Uuid::new_v4(), "three-down", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(status, SagaStatus::Compensated);
        assert_eq!(
            log.entries(),
            vec![
                "first",
                "second",
                "third",
                "doomed",
                "undo-third",
                "undo-second",
                "undo-first",
            ]
        );
    }

    #[tokio::test]
    async fn test_steps_without_compensation_are_skipped_during_rollback() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());

        orchestrator.register(
            SagaDefinition::new("mixed")
                .step("notify", logged_action(log.clone(), "notify"))
                .compensated_step(
                    "reserve",
                    logged_action(log.clone(), "reserve"),
                    logged_action(log.clone(), "release"),
                )
                .step("doomed", failing_action(log.clone(), "doomed")),
        );

        let status = orchestrator
            .start(Uuid::new_v4(), "mixed", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(status, SagaStatus::Compensated);
        assert_eq!(log.entries(), vec!["notify", "reserve", "doomed", "release"]);
    }

    #[tokio::test]
    async fn test_compensation_failure_parks_saga_in_failed() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());

        orchestrator.register(
            SagaDefinition::new("broken-rollback")
                .compensated_step(
                    "reserve",
                    logged_action(log.clone(), "reserve"),
                    failing_action(log.clone(), "release"),
                )
                .step("doomed", failing_action(log.clone(), "doomed")),
        );

        let saga_id = Uuid::new_v4();
        let status = orchestrator
            .start(saga_id, "broken-rollback", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(status, SagaStatus::Failed);

        let state = store.load(saga_id).await.unwrap().unwrap();
        assert_eq!(state.status, SagaStatus::Failed);
        // The step stays on the completed list so an operator can see what
        // was never rolled back
        assert_eq!(state.completed_steps, vec!["reserve"]);
        assert!(state.last_error.unwrap().contains("release"));
    }

    #[tokio::test]
    async fn test_resume_continues_from_persisted_step_index() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(fulfillment_definition(log.clone(), false));

        // Simulate a crash after reserve-stock succeeded
        let saga_id = Uuid::new_v4();
        let mut crashed = SagaState::new(
            saga_id,
            "sale-fulfillment",
            serde_json::json!({}),
            chrono::Utc::now(),
        );
        crashed.status = SagaStatus::Running;
        crashed.current_step_index = 1;
        crashed.completed_steps = vec!["reserve-stock".to_string()];
        store.save(&crashed).await.unwrap();

        let status = orchestrator.resume(saga_id).await.unwrap();

        assert_eq!(status, SagaStatus::Completed);
        // reserve-stock is NOT re-executed
        assert_eq!(log.entries(), vec!["charge-payment", "confirm-sale"]);
    }

    #[tokio::test]
    async fn test_redelivered_trigger_does_not_rerun_terminal_saga() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(fulfillment_definition(log.clone(), false));

        let saga_id = Uuid::new_v4();
        orchestrator
            .start(saga_id, "sale-fulfillment", serde_json::json!({}))
            .await
            .unwrap();
        let status = orchestrator
            .start(saga_id, "sale-fulfillment", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(status, SagaStatus::Completed);
        // Steps ran exactly once
        assert_eq!(
            log.entries(),
            vec!["reserve-stock", "charge-payment", "confirm-sale"]
        );
    }

    #[tokio::test]
    async fn test_resume_mid_compensation_finishes_rollback() {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(ActionLog::default());
        let mut orchestrator = orchestrator(store.clone());
        orchestrator.register(fulfillment_definition(log.clone(), false));

        // Crash happened after charge-payment was rolled back but before
        // reserve-stock was
        let saga_id = Uuid::new_v4();
        let mut crashed = SagaState::new(
            saga_id,
            "sale-fulfillment",
            serde_json::json!({}),
            chrono::Utc::now(),
        );
        crashed.status = SagaStatus::Compensating;
        crashed.current_step_index = 2;
        crashed.completed_steps = vec!["reserve-stock".to_string()];
        store.save(&crashed).await.unwrap();

        let status = orchestrator.resume(saga_id).await.unwrap();

        assert_eq!(status, SagaStatus::Compensated);
        assert_eq!(log.entries(), vec!["release-stock"]);
    }
}
