// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic, reusable event sourcing infrastructure.
// Domain-specific code is in src/domain/.
//
// ============================================================================

pub mod core;
pub mod handler;
pub mod store;

pub use core::*;
pub use handler::CommandHandler;
pub use store::*;
