// ============================================================================
// Customer Domain
// ============================================================================

pub mod aggregate;
pub mod commands;
pub mod errors;
pub mod events;

pub use aggregate::CustomerAggregate;
pub use commands::CustomerCommand;
pub use errors::CustomerError;
pub use events::*;

use crate::event_sourcing::CommandHandler;

pub type CustomerCommandHandler = CommandHandler<CustomerAggregate>;
