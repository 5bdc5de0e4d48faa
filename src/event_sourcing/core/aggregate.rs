use uuid::Uuid;

use super::error::RehydrateError;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate - Pure Replay and Decision Logic
// ============================================================================
//
// Key principles:
// 1. State is derived by folding events, never stored directly
// 2. Commands are validated against current state before emitting events
// 3. Events are facts that have already happened - applying one cannot fail
// 4. Folding is deterministic: no clock reads, no randomness, no I/O. All
//    timestamps live in event payloads or envelopes. Time travel and crash
//    recovery both lean on this.
//
// This is the GENERIC trait; domain aggregates live in src/domain/.
//
// ============================================================================

pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error: std::fmt::Display;

    /// Stable name used as the stream's aggregate_type, e.g. "Sale"
    fn aggregate_type() -> &'static str;

    /// Does this command create a new aggregate (valid against an empty
    /// stream)? Everything else requires an existing stream.
    fn is_creation_command(command: &Self::Command) -> bool;

    /// Decide events for a creation command, with no prior state.
    fn handle_create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Build initial state from the first event of the stream.
    fn apply_first(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Fold a subsequent event into state. Infallible: events already
    /// happened, so every transition must be total.
    fn apply(&mut self, event: &Self::Event);

    /// Validate a command against current state and return the new facts.
    /// Never mutates `self`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Count of folded events; the expected version for the next append.
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);

    /// Fold an ordered event stream back into state.
    fn rehydrate(events: &[EventEnvelope<Self::Event>]) -> Result<Self, RehydrateError> {
        let first = events.first().ok_or(RehydrateError::EmptyStream)?;

        let mut aggregate = Self::apply_first(&first.event_data)
            .map_err(|e| RehydrateError::CorruptStream(e.to_string()))?;
        aggregate.set_version(first.stream_version);

        for envelope in events.iter().skip(1) {
            aggregate.apply(&envelope.event_data);
            aggregate.set_version(envelope.stream_version);
        }

        Ok(aggregate)
    }
}
