// ============================================================================
// Messaging - Broker Abstraction and Implementations
// ============================================================================

pub mod kafka;
pub mod publisher;

pub use kafka::KafkaPublisher;
pub use publisher::{InMemoryPublisher, MessagePublisher, PublishError, PublishedMessage};
