use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::DomainEvent;

use super::value_objects::SaleLine;

// ============================================================================
// Sale Events
// ============================================================================
//
// Facts only - no timestamps in payloads. "When" lives on the envelope's
// occurred_at, which keeps replay deterministic.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SaleEvent {
    Started(SaleStarted),
    LineAdded(SaleLineAdded),
    LineRemoved(SaleLineRemoved),
    DiscountApplied(SaleDiscountApplied),
    Finalized(SaleFinalized),
    Cancelled(SaleCancelled),
}

impl DomainEvent for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::Started(_) => "SaleStarted",
            SaleEvent::LineAdded(_) => "SaleLineAdded",
            SaleEvent::LineRemoved(_) => "SaleLineRemoved",
            SaleEvent::DiscountApplied(_) => "SaleDiscountApplied",
            SaleEvent::Finalized(_) => "SaleFinalized",
            SaleEvent::Cancelled(_) => "SaleCancelled",
        }
    }
}

/// First event of every sale stream
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleStarted {
    pub sale_id: Uuid,
    pub customer_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleLineAdded {
    pub line: SaleLine,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleLineRemoved {
    pub product_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleDiscountApplied {
    /// Whole-sale discount, percent in [0, 100]
    pub percent: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleFinalized {
    pub total_cents: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SaleCancelled {
    pub reason: Option<String>,
}
