// ============================================================================
// Event Sourcing Store - Persistence Layer
// ============================================================================
//
// The durable collaborator trait, the typed store facade built on it, and
// the in-memory backend used by tests and the demo.
//
// ============================================================================

pub mod event_store;
pub mod memory;

pub use event_store::{EventStore, StreamStore};
pub use memory::InMemoryStore;
