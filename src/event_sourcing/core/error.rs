use uuid::Uuid;

use crate::utils::IsTransient;

// ============================================================================
// Error Taxonomy - Tagged Error Kinds for Command Handling
// ============================================================================
//
// Callers branch on these variants instead of inspecting exception types:
//
// - ConcurrencyConflict: stream version moved under us. Recoverable - the
//   command handler reloads and retries a bounded number of times before
//   surfacing it.
// - InvariantViolation: the aggregate rejected the command. Never retried.
// - NotFound: the command targets a stream with zero events. Distinct from
//   an invariant violation so callers can answer 404 vs 422.
//
// ============================================================================

/// Failure of the append path inside the stream store.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("concurrency conflict on {aggregate_id}: expected version {expected}, current is {actual}")]
    ConcurrencyConflict {
        aggregate_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("cannot append empty event list")]
    EmptyAppend,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failure surfaced to whoever issued a command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("concurrency conflict: expected version {expected}, current is {actual}")]
    ConcurrencyConflict { expected: i64, actual: i64 },

    #[error("command rejected: {0}")]
    InvariantViolation(String),

    #[error("aggregate not found: {0}")]
    NotFound(Uuid),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    pub fn from_store(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            } => Self::ConcurrencyConflict { expected, actual },
            EventStoreError::EmptyAppend => {
                Self::Internal(anyhow::anyhow!("empty event list reached the store"))
            }
            EventStoreError::Backend(e) => Self::Internal(e),
        }
    }
}

// Only version conflicts are worth a retry; everything else is either a
// deliberate rejection or a bug.
impl IsTransient for CommandError {
    fn is_transient(&self) -> bool {
        matches!(self, CommandError::ConcurrencyConflict { .. })
    }
}

/// Failure while folding an event stream back into state.
#[derive(Debug, thiserror::Error)]
pub enum RehydrateError {
    #[error("no events to rehydrate from")]
    EmptyStream,

    #[error("corrupt stream: {0}")]
    CorruptStream(String),
}
