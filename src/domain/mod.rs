// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// One subdirectory per aggregate with its value objects, events, commands,
// errors and the aggregate itself. Completely separate from the generic
// event sourcing infrastructure.
//
// ============================================================================

pub mod catalog;
pub mod customer;
pub mod sale;
