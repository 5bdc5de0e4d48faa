use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

use crate::domain::catalog::ProductEvent;
use crate::domain::sale::{SaleEvent, SaleStatus};
use crate::event_sourcing::core::{deserialize_event, RecordedEvent};

use super::engine::Projection;

// ============================================================================
// Read Models - Query-Side Views Fed by the Projection Engine
// ============================================================================
//
// Each projection keys its rows by aggregate id and tracks applied event ids,
// so replaying a batch after a crash (or a redelivered feed entry) changes
// nothing. Events for other aggregate types pass through untouched.
//
// ============================================================================

/// One row per sale: who is buying, how big the basket is, where the sale
/// stands in its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleSummary {
    pub sale_id: Uuid,
    pub customer_id: Uuid,
    pub line_count: usize,
    pub total_quantity: i32,
    pub discount_percent: i32,
    pub status: SaleStatus,
    pub total_cents: Option<i64>,
}

#[derive(Default)]
struct SaleSummaryState {
    rows: HashMap<Uuid, SaleSummary>,
    // quantity per product, needed to undo a removed line
    line_quantities: HashMap<Uuid, HashMap<Uuid, i32>>,
    applied: HashSet<Uuid>,
}

#[derive(Default)]
pub struct SaleSummaryProjection {
    state: RwLock<SaleSummaryState>,
}

impl SaleSummaryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sale_id: Uuid) -> Option<SaleSummary> {
        self.state.read().expect("projection lock poisoned").rows.get(&sale_id).cloned()
    }

    pub fn all(&self) -> Vec<SaleSummary> {
        self.state.read().expect("projection lock poisoned").rows.values().cloned().collect()
    }
}

#[async_trait]
impl Projection for SaleSummaryProjection {
    fn name(&self) -> &'static str {
        "sale-summary"
    }

    async fn apply(&self, event: &RecordedEvent) -> anyhow::Result<()> {
        if event.aggregate_type != "Sale" {
            return Ok(());
        }

        let mut state = self.state.write().expect("projection lock poisoned");
        if !state.applied.insert(event.event_id) {
            tracing::debug!(event_id = %event.event_id, "Duplicate event, already applied");
            return Ok(());
        }

        let sale_event: SaleEvent = deserialize_event(&event.payload)?;
        let sale_id = event.aggregate_id;

        match sale_event {
            SaleEvent::Started(started) => {
                state.rows.insert(
                    sale_id,
                    SaleSummary {
                        sale_id,
                        customer_id: started.customer_id,
                        line_count: 0,
                        total_quantity: 0,
                        discount_percent: 0,
                        status: SaleStatus::Open,
                        total_cents: None,
                    },
                );
            }
            SaleEvent::LineAdded(added) => {
                let quantities = state.line_quantities.entry(sale_id).or_default();
                let merged = !quantities.contains_key(&added.line.product_id);
                *quantities.entry(added.line.product_id).or_insert(0) += added.line.quantity;

                if let Some(row) = state.rows.get_mut(&sale_id) {
                    if merged {
                        row.line_count += 1;
                    }
                    row.total_quantity += added.line.quantity;
                }
            }
            SaleEvent::LineRemoved(removed) => {
                let dropped = state
                    .line_quantities
                    .get_mut(&sale_id)
                    .and_then(|quantities| quantities.remove(&removed.product_id));

                if let (Some(quantity), Some(row)) = (dropped, state.rows.get_mut(&sale_id)) {
                    row.line_count -= 1;
                    row.total_quantity -= quantity;
                }
            }
            SaleEvent::DiscountApplied(discount) => {
                if let Some(row) = state.rows.get_mut(&sale_id) {
                    row.discount_percent = discount.percent;
                }
            }
            SaleEvent::Finalized(finalized) => {
                if let Some(row) = state.rows.get_mut(&sale_id) {
                    row.status = SaleStatus::Finalized;
                    row.total_cents = Some(finalized.total_cents);
                }
            }
            SaleEvent::Cancelled(_) => {
                if let Some(row) = state.rows.get_mut(&sale_id) {
                    row.status = SaleStatus::Cancelled;
                }
            }
        }

        Ok(())
    }
}

/// One row per product: catalog data plus live stock position.
#[derive(Debug, Clone, PartialEq)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub on_hand: i32,
    pub held: i32,
}

impl StockLevel {
    pub fn available(&self) -> i32 {
        self.on_hand - self.held
    }
}

#[derive(Default)]
struct StockLevelState {
    rows: HashMap<Uuid, StockLevel>,
    // quantity per open reservation, needed when a release comes in
    reservations: HashMap<Uuid, HashMap<Uuid, i32>>,
    applied: HashSet<Uuid>,
}

#[derive(Default)]
pub struct StockLevelProjection {
    state: RwLock<StockLevelState>,
}

impl StockLevelProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, product_id: Uuid) -> Option<StockLevel> {
        self.state.read().expect("projection lock poisoned").rows.get(&product_id).cloned()
    }
}

#[async_trait]
impl Projection for StockLevelProjection {
    fn name(&self) -> &'static str {
        "stock-level"
    }

    async fn apply(&self, event: &RecordedEvent) -> anyhow::Result<()> {
        if event.aggregate_type != "Product" {
            return Ok(());
        }

        let mut state = self.state.write().expect("projection lock poisoned");
        if !state.applied.insert(event.event_id) {
            tracing::debug!(event_id = %event.event_id, "Duplicate event, already applied");
            return Ok(());
        }

        let product_event: ProductEvent = deserialize_event(&event.payload)?;
        let product_id = event.aggregate_id;

        match product_event {
            ProductEvent::Listed(listed) => {
                state.rows.insert(
                    product_id,
                    StockLevel {
                        product_id,
                        name: listed.name,
                        price_cents: listed.price_cents,
                        on_hand: listed.initial_stock,
                        held: 0,
                    },
                );
            }
            ProductEvent::PriceChanged(changed) => {
                if let Some(row) = state.rows.get_mut(&product_id) {
                    row.price_cents = changed.price_cents;
                }
            }
            ProductEvent::StockReserved(reserved) => {
                state
                    .reservations
                    .entry(product_id)
                    .or_default()
                    .insert(reserved.reservation_id, reserved.quantity);
                if let Some(row) = state.rows.get_mut(&product_id) {
                    row.held += reserved.quantity;
                }
            }
            ProductEvent::StockReleased(released) => {
                let freed = state
                    .reservations
                    .get_mut(&product_id)
                    .and_then(|open| open.remove(&released.reservation_id));
                if let (Some(quantity), Some(row)) = (freed, state.rows.get_mut(&product_id)) {
                    row.held -= quantity;
                }
            }
            ProductEvent::StockReplenished(replenished) => {
                if let Some(row) = state.rows.get_mut(&product_id) {
                    row.on_hand += replenished.quantity;
                }
            }
        }

        Ok(())
    }
}
