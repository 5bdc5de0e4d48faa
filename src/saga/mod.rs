// ============================================================================
// Saga - Multi-Aggregate Workflows with Compensation
// ============================================================================
//
// Declarative step tables (definition.rs) interpreted by one generic
// orchestrator (orchestrator.rs), with progress persisted after every
// transition (state.rs) so crashed sagas can be resumed.
//
// ============================================================================

pub mod definition;
pub mod orchestrator;
pub mod state;

pub use definition::{action, SagaAction, SagaContext, SagaDefinition, SagaStep, SagaStepError};
pub use orchestrator::SagaOrchestrator;
pub use state::{SagaState, SagaStateStore, SagaStatus};
