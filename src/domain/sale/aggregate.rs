use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::Aggregate;

use super::commands::SaleCommand;
use super::errors::SaleError;
use super::events::*;
use super::value_objects::{SaleLine, SaleStatus};

// ============================================================================
// Sale Aggregate
// ============================================================================
//
// State is a pure fold over the event stream. Finalized and Cancelled are
// terminal: once reached, every further business command is rejected (the
// aggregate is conceptually destroyed, the stream stays).
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleAggregate {
    pub id: Uuid,
    pub version: i64,

    pub customer_id: Uuid,
    pub lines: Vec<SaleLine>,
    pub discount_percent: i32,
    pub status: SaleStatus,
    pub cancelled_reason: Option<String>,
}

impl SaleAggregate {
    /// Sum of lines after discount, in cents.
    pub fn total_cents(&self) -> i64 {
        let gross: i64 = self
            .lines
            .iter()
            .map(|l| i64::from(l.quantity) * l.unit_price_cents)
            .sum();
        gross - gross * i64::from(self.discount_percent) / 100
    }

    fn validate_line(line: &SaleLine) -> Result<(), SaleError> {
        if line.quantity <= 0 {
            return Err(SaleError::InvalidQuantity(line.quantity));
        }
        if line.unit_price_cents < 0 {
            return Err(SaleError::InvalidUnitPrice(line.unit_price_cents));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SaleError> {
        match self.status {
            SaleStatus::Open => Ok(()),
            SaleStatus::Finalized => Err(SaleError::AlreadyFinalized),
            SaleStatus::Cancelled => Err(SaleError::AlreadyCancelled),
        }
    }
}

impl Aggregate for SaleAggregate {
    type Event = SaleEvent;
    type Command = SaleCommand;
    type Error = SaleError;

    fn aggregate_type() -> &'static str {
        "Sale"
    }

    fn is_creation_command(command: &Self::Command) -> bool {
        matches!(command, SaleCommand::StartSale { .. })
    }

    fn handle_create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::StartSale {
                sale_id,
                customer_id,
            } => Ok(vec![SaleEvent::Started(SaleStarted {
                sale_id: *sale_id,
                customer_id: *customer_id,
            })]),
            _ => Err(SaleError::NotStarted),
        }
    }

    fn apply_first(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            SaleEvent::Started(e) => Ok(Self {
                id: e.sale_id,
                version: 0,
                customer_id: e.customer_id,
                lines: Vec::new(),
                discount_percent: 0,
                status: SaleStatus::Open,
                cancelled_reason: None,
            }),
            _ => Err(SaleError::NotStarted),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::Started(_) => {}
            SaleEvent::LineAdded(e) => {
                // Same product twice merges into one line
                match self
                    .lines
                    .iter_mut()
                    .find(|l| l.product_id == e.line.product_id)
                {
                    Some(existing) => existing.quantity += e.line.quantity,
                    None => self.lines.push(e.line.clone()),
                }
            }
            SaleEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.product_id != e.product_id);
            }
            SaleEvent::DiscountApplied(e) => {
                self.discount_percent = e.percent;
            }
            SaleEvent::Finalized(_) => {
                self.status = SaleStatus::Finalized;
            }
            SaleEvent::Cancelled(e) => {
                self.status = SaleStatus::Cancelled;
                self.cancelled_reason = e.reason.clone();
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::StartSale { .. } => Err(SaleError::AlreadyStarted),

            SaleCommand::AddLine { line } => {
                self.ensure_open()?;
                Self::validate_line(line)?;

                Ok(vec![SaleEvent::LineAdded(SaleLineAdded {
                    line: line.clone(),
                })])
            }

            SaleCommand::RemoveLine { product_id } => {
                self.ensure_open()?;

                if !self.lines.iter().any(|l| l.product_id == *product_id) {
                    return Err(SaleError::UnknownLine(*product_id));
                }

                Ok(vec![SaleEvent::LineRemoved(SaleLineRemoved {
                    product_id: *product_id,
                })])
            }

            SaleCommand::ApplyDiscount { percent } => {
                self.ensure_open()?;

                if !(0..=100).contains(percent) {
                    return Err(SaleError::InvalidDiscount(*percent));
                }

                Ok(vec![SaleEvent::DiscountApplied(SaleDiscountApplied {
                    percent: *percent,
                })])
            }

            SaleCommand::FinalizeSale => {
                match self.status {
                    // Retried finalize is a no-op, not an error
                    SaleStatus::Finalized => return Ok(vec![]),
                    SaleStatus::Cancelled => return Err(SaleError::AlreadyCancelled),
                    SaleStatus::Open => {}
                }

                if self.lines.is_empty() {
                    return Err(SaleError::EmptySale);
                }

                Ok(vec![SaleEvent::Finalized(SaleFinalized {
                    total_cents: self.total_cents(),
                })])
            }

            SaleCommand::CancelSale { reason } => {
                self.ensure_open()?;

                Ok(vec![SaleEvent::Cancelled(SaleCancelled {
                    reason: reason.clone(),
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::{DomainEvent, EventEnvelope};
    use chrono::Utc;

    fn envelope(aggregate_id: Uuid, version: i64, event: SaleEvent) -> EventEnvelope<SaleEvent> {
        EventEnvelope::new(
            aggregate_id,
            version,
            event.event_type().to_string(),
            event,
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    fn line(quantity: i32, unit_price_cents: i64) -> SaleLine {
        SaleLine {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price_cents,
        }
    }

    fn started_stream(sale_id: Uuid) -> Vec<EventEnvelope<SaleEvent>> {
        vec![envelope(
            sale_id,
            1,
            SaleEvent::Started(SaleStarted {
                sale_id,
                customer_id: Uuid::new_v4(),
            }),
        )]
    }

    #[test]
    fn test_rehydrate_folds_lines_and_version() {
        let sale_id = Uuid::new_v4();
        let mut events = started_stream(sale_id);
        events.push(envelope(
            sale_id,
            2,
            SaleEvent::LineAdded(SaleLineAdded { line: line(2, 500) }),
        ));
        events.push(envelope(
            sale_id,
            3,
            SaleEvent::DiscountApplied(SaleDiscountApplied { percent: 10 }),
        ));

        let sale = SaleAggregate::rehydrate(&events).unwrap();

        assert_eq!(sale.id, sale_id);
        assert_eq!(sale.version, 3);
        assert_eq!(sale.lines.len(), 1);
        assert_eq!(sale.discount_percent, 10);
        assert_eq!(sale.total_cents(), 900);
    }

    #[test]
    fn test_replay_is_deterministic() {
        let sale_id = Uuid::new_v4();
        let mut events = started_stream(sale_id);
        let shared = line(4, 250);
        events.push(envelope(
            sale_id,
            2,
            SaleEvent::LineAdded(SaleLineAdded {
                line: shared.clone(),
            }),
        ));
        events.push(envelope(
            sale_id,
            3,
            SaleEvent::LineAdded(SaleLineAdded { line: shared }),
        ));

        let once = SaleAggregate::rehydrate(&events).unwrap();
        let twice = SaleAggregate::rehydrate(&events).unwrap();

        assert_eq!(once.lines, twice.lines);
        assert_eq!(once.version, twice.version);
        assert_eq!(once.status, twice.status);
        // Same product merged into one line
        assert_eq!(once.lines.len(), 1);
        assert_eq!(once.lines[0].quantity, 8);
    }

    #[test]
    fn test_add_line_after_finalize_is_rejected() {
        let sale_id = Uuid::new_v4();
        let mut events = started_stream(sale_id);
        events.push(envelope(
            sale_id,
            2,
            SaleEvent::LineAdded(SaleLineAdded { line: line(1, 100) }),
        ));
        events.push(envelope(
            sale_id,
            3,
            SaleEvent::Finalized(SaleFinalized { total_cents: 100 }),
        ));

        let sale = SaleAggregate::rehydrate(&events).unwrap();
        let result = sale.handle(&SaleCommand::AddLine { line: line(1, 100) });

        assert!(matches!(result, Err(SaleError::AlreadyFinalized)));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let sale_id = Uuid::new_v4();
        let mut events = started_stream(sale_id);
        events.push(envelope(
            sale_id,
            2,
            SaleEvent::LineAdded(SaleLineAdded { line: line(1, 100) }),
        ));
        events.push(envelope(
            sale_id,
            3,
            SaleEvent::Finalized(SaleFinalized { total_cents: 100 }),
        ));

        let sale = SaleAggregate::rehydrate(&events).unwrap();
        let new_events = sale.handle(&SaleCommand::FinalizeSale).unwrap();
        assert!(new_events.is_empty());
    }

    #[test]
    fn test_discount_bounds() {
        let sale = SaleAggregate::rehydrate(&started_stream(Uuid::new_v4())).unwrap();

        assert!(matches!(
            sale.handle(&SaleCommand::ApplyDiscount { percent: 101 }),
            Err(SaleError::InvalidDiscount(101))
        ));
        assert!(matches!(
            sale.handle(&SaleCommand::ApplyDiscount { percent: -1 }),
            Err(SaleError::InvalidDiscount(-1))
        ));
        assert!(sale.handle(&SaleCommand::ApplyDiscount { percent: 100 }).is_ok());
        assert!(sale.handle(&SaleCommand::ApplyDiscount { percent: 0 }).is_ok());
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let sale = SaleAggregate::rehydrate(&started_stream(Uuid::new_v4())).unwrap();

        let result = sale.handle(&SaleCommand::AddLine { line: line(0, 100) });
        assert!(matches!(result, Err(SaleError::InvalidQuantity(0))));
    }

    #[test]
    fn test_finalize_empty_sale_is_rejected() {
        let sale = SaleAggregate::rehydrate(&started_stream(Uuid::new_v4())).unwrap();

        assert!(matches!(
            sale.handle(&SaleCommand::FinalizeSale),
            Err(SaleError::EmptySale)
        ));
    }

    #[test]
    fn test_remove_unknown_line_is_rejected() {
        let sale = SaleAggregate::rehydrate(&started_stream(Uuid::new_v4())).unwrap();
        let missing = Uuid::new_v4();

        assert!(matches!(
            sale.handle(&SaleCommand::RemoveLine { product_id: missing }),
            Err(SaleError::UnknownLine(id)) if id == missing
        ));
    }

    #[test]
    fn test_cancel_then_business_command_is_rejected() {
        let sale_id = Uuid::new_v4();
        let mut events = started_stream(sale_id);
        events.push(envelope(
            sale_id,
            2,
            SaleEvent::Cancelled(SaleCancelled {
                reason: Some("customer walked out".to_string()),
            }),
        ));

        let sale = SaleAggregate::rehydrate(&events).unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);

        assert!(matches!(
            sale.handle(&SaleCommand::AddLine { line: line(1, 100) }),
            Err(SaleError::AlreadyCancelled)
        ));
    }
}
