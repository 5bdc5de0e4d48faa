use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Catalog Events - Product Listing and Stock Movements
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    Listed(ProductListed),
    PriceChanged(ProductPriceChanged),
    StockReserved(StockReserved),
    StockReleased(StockReleased),
    StockReplenished(StockReplenished),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Listed(_) => "ProductListed",
            ProductEvent::PriceChanged(_) => "ProductPriceChanged",
            ProductEvent::StockReserved(_) => "StockReserved",
            ProductEvent::StockReleased(_) => "StockReleased",
            ProductEvent::StockReplenished(_) => "StockReplenished",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductListed {
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub initial_stock: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ProductPriceChanged {
    pub price_cents: i64,
}

/// A hold on stock for one sale; released or consumed by the saga
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StockReserved {
    pub reservation_id: Uuid,
    pub quantity: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StockReleased {
    pub reservation_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StockReplenished {
    pub quantity: i32,
}
