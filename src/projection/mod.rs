// ============================================================================
// Projections - Read Models from the Global Event Feed
// ============================================================================

pub mod engine;
pub mod read_model;

pub use engine::{CheckpointStore, Projection, ProjectionConfig, ProjectionEngine};
pub use read_model::{SaleSummary, SaleSummaryProjection, StockLevel, StockLevelProjection};
