use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Saga Definition - Explicit Step Table
// ============================================================================
//
// A saga definition is an ordered list of steps, each pairing a forward
// action with an optional compensating action. One generic orchestrator
// interprets the table; there is no bespoke control flow per saga.
//
// Forward actions must be idempotent - at-least-once delivery means the same
// trigger can arrive twice. Compensations semantically undo their step.
//
// ============================================================================

/// Business payload handed to every step of one saga instance.
#[derive(Debug, Clone)]
pub struct SagaContext {
    pub saga_id: Uuid,
    pub payload: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SagaStepError(pub String);

impl SagaStepError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[async_trait]
pub trait SagaAction: Send + Sync {
    async fn execute(&self, ctx: &SagaContext) -> Result<(), SagaStepError>;
}

type ActionFuture = Pin<Box<dyn Future<Output = Result<(), SagaStepError>> + Send>>;

/// Adapter so closures can serve as actions in wiring code and tests.
struct FnAction(Box<dyn Fn(SagaContext) -> ActionFuture + Send + Sync>);

#[async_trait]
impl SagaAction for FnAction {
    async fn execute(&self, ctx: &SagaContext) -> Result<(), SagaStepError> {
        (self.0)(ctx.clone()).await
    }
}

pub fn action<F, Fut>(f: F) -> Arc<dyn SagaAction>
where
    F: Fn(SagaContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SagaStepError>> + Send + 'static,
{
    Arc::new(FnAction(Box::new(move |ctx| Box::pin(f(ctx)))))
}

pub struct SagaStep {
    pub name: String,
    pub forward: Arc<dyn SagaAction>,
    /// Steps with nothing to undo leave this empty and are skipped during
    /// compensation
    pub compensation: Option<Arc<dyn SagaAction>>,
}

pub struct SagaDefinition {
    name: String,
    steps: Vec<SagaStep>,
}

impl SagaDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, name: &str, forward: Arc<dyn SagaAction>) -> Self {
        self.steps.push(SagaStep {
            name: name.to_string(),
            forward,
            compensation: None,
        });
        self
    }

    pub fn compensated_step(
        mut self,
        name: &str,
        forward: Arc<dyn SagaAction>,
        compensation: Arc<dyn SagaAction>,
    ) -> Self {
        self.steps.push(SagaStep {
            name: name.to_string(),
            forward,
            compensation: Some(compensation),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    pub fn step_named(&self, name: &str) -> Option<&SagaStep> {
        self.steps.iter().find(|s| s.name == name)
    }
}
