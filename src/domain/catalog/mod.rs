// ============================================================================
// Catalog Domain - Products and Stock
// ============================================================================

pub mod aggregate;
pub mod commands;
pub mod errors;
pub mod events;

pub use aggregate::ProductAggregate;
pub use commands::ProductCommand;
pub use errors::ProductError;
pub use events::*;

use crate::event_sourcing::CommandHandler;

pub type ProductCommandHandler = CommandHandler<ProductAggregate>;
