use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Saga State - Persisted Progress of One Saga Instance
// ============================================================================
//
// Persisted after EVERY transition so a crash mid-saga can be resumed by
// reloading state and continuing from current_step_index. Terminal states:
// Completed, Compensated, Failed.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaStatus {
    NotStarted,
    Running,
    Completed,
    /// A compensation failed; the saga needs operator attention
    Failed,
    Compensating,
    Compensated,
}

impl SagaStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Completed | SagaStatus::Compensated | SagaStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaState {
    pub saga_id: Uuid,
    pub definition_name: String,
    pub status: SagaStatus,

    /// Next forward step to run (0-based)
    pub current_step_index: usize,

    /// Names of forward steps that succeeded, in execution order. Drained
    /// back-to-front while compensating so a resumed saga knows what is
    /// still outstanding.
    pub completed_steps: Vec<String>,

    /// Business payload handed to every step
    pub context: serde_json::Value,

    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SagaState {
    pub fn new(
        saga_id: Uuid,
        definition_name: &str,
        context: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            saga_id,
            definition_name: definition_name.to_string(),
            status: SagaStatus::NotStarted,
            current_step_index: 0,
            completed_steps: Vec::new(),
            context,
            last_error: None,
            updated_at: now,
        }
    }
}

/// Durable collaborator holding saga progress (storage engine out of scope).
#[async_trait]
pub trait SagaStateStore: Send + Sync {
    async fn load(&self, saga_id: Uuid) -> anyhow::Result<Option<SagaState>>;
    async fn save(&self, state: &SagaState) -> anyhow::Result<()>;
}
