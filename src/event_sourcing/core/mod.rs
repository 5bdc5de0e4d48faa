// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Generic, reusable event sourcing building blocks that work with ANY
// domain aggregate. No Sale, Customer or Product knowledge in here.
//
// ============================================================================

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;

pub use aggregate::Aggregate;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CommandError, EventStoreError, RehydrateError};
pub use event::{
    deserialize_event, serialize_event, DomainEvent, EventEnvelope, RecordedEvent,
};
