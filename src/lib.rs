// ============================================================================
// salestream - Event-Sourced Sales Core
// ============================================================================
//
// Event-sourced catalog, customer and sale aggregates with a transactional
// outbox, checkpoint-driven projections and compensating sagas. The
// event_sourcing, outbox, projection and saga modules are generic over the
// domain; everything business-specific lives under domain/.
//
// ============================================================================

pub mod domain;
pub mod event_sourcing;
pub mod messaging;
pub mod metrics;
pub mod outbox;
pub mod projection;
pub mod saga;
pub mod utils;
