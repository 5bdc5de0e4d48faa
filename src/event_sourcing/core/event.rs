use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use anyhow::Result;

// ============================================================================
// Event Shapes - Typed Envelope + Persisted Record
// ============================================================================
//
// Two representations of the same fact:
//
// - `EventEnvelope<E>`: the typed, in-memory form aggregates work with.
// - `RecordedEvent`: the serialized form the stream store persists. Carries
//   the global sequence assigned at append time, which is what the
//   projection engine pages through.
//
// Both are GENERIC over the domain - no Sale/Customer/Product knowledge here.
//
// ============================================================================

/// Typed event envelope - wraps a domain event with stream metadata
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,

    /// Position within this aggregate's stream, starting at 1
    pub stream_version: i64,

    pub event_type: String,
    pub event_data: E,

    /// Groups related events across aggregates (e.g. one saga run)
    pub correlation_id: Uuid,

    pub occurred_at: DateTime<Utc>,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        stream_version: i64,
        event_type: String,
        event_data: E,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            stream_version,
            event_type,
            event_data,
            correlation_id,
            occurred_at,
        }
    }
}

/// Persisted event record - what the stream store actually holds
///
/// Immutable once appended. `stream_version` orders events within one
/// aggregate; `global_sequence` is the durable write order across all
/// aggregates (assigned by the store, 0 until then).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RecordedEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: String,
    pub correlation_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub stream_version: i64,
    pub global_sequence: i64,
}

impl RecordedEvent {
    /// Serialize a typed envelope into its persisted form
    pub fn from_envelope<E: DomainEvent>(
        envelope: &EventEnvelope<E>,
        aggregate_type: &str,
    ) -> Result<Self> {
        Ok(Self {
            event_id: envelope.event_id,
            aggregate_id: envelope.aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            event_type: envelope.event_type.clone(),
            payload: serialize_event(&envelope.event_data)?,
            correlation_id: envelope.correlation_id,
            occurred_at: envelope.occurred_at,
            stream_version: envelope.stream_version,
            global_sequence: 0,
        })
    }

    /// Deserialize back into a typed envelope
    pub fn to_envelope<E: DomainEvent>(&self) -> Result<EventEnvelope<E>> {
        Ok(EventEnvelope {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            stream_version: self.stream_version,
            event_type: self.event_type.clone(),
            event_data: deserialize_event(&self.payload)?,
            correlation_id: self.correlation_id,
            occurred_at: self.occurred_at,
        })
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events must implement this trait to flow through the store.
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    /// Stable per-variant name, e.g. "SaleLineAdded"
    fn event_type(&self) -> &'static str;
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: for<'de> Deserialize<'de>>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Tests
// ============================================================================
