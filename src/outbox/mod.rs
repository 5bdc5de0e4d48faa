// ============================================================================
// Transactional Outbox
// ============================================================================
//
// Row model + durable table interface, the service that builds rows inside
// the append unit of work, and the background processor that publishes them.
//
// ============================================================================

pub mod message;
pub mod processor;
pub mod service;

pub use message::{OutboxMessage, OutboxStatus, OutboxStore};
pub use processor::{OutboxProcessor, OutboxProcessorConfig};
pub use service::OutboxService;
