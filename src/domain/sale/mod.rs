// ============================================================================
// Sale Domain
// ============================================================================
//
// Everything Sale-specific: value objects, events, commands, errors and the
// aggregate. Command handling goes through the generic CommandHandler.
//
// ============================================================================

pub mod aggregate;
pub mod commands;
pub mod errors;
pub mod events;
pub mod value_objects;

pub use aggregate::SaleAggregate;
pub use commands::SaleCommand;
pub use errors::SaleError;
pub use events::*;
pub use value_objects::{SaleLine, SaleStatus};

use crate::event_sourcing::CommandHandler;

pub type SaleCommandHandler = CommandHandler<SaleAggregate>;
