use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::event_sourcing::core::Aggregate;

use super::commands::ProductCommand;
use super::errors::ProductError;
use super::events::*;

// ============================================================================
// Product Aggregate - Catalog Entry with Stock Reservations
// ============================================================================
//
// Tracks on-hand stock plus active holds. `available` is on-hand minus held;
// a reservation moves quantity from available into `reservations` without
// touching on-hand until the hold is consumed. Released reservation ids are
// remembered so a redelivered release is a no-op instead of an error.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAggregate {
    pub id: Uuid,
    pub version: i64,

    pub name: String,
    pub price_cents: i64,
    pub on_hand: i32,

    /// Active holds: reservation id -> quantity
    pub reservations: HashMap<Uuid, i32>,
    /// Reservation ids already released (for idempotent redelivery)
    pub released: HashSet<Uuid>,
}

impl ProductAggregate {
    pub fn held(&self) -> i32 {
        self.reservations.values().sum()
    }

    pub fn available(&self) -> i32 {
        self.on_hand - self.held()
    }
}

impl Aggregate for ProductAggregate {
    type Event = ProductEvent;
    type Command = ProductCommand;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn is_creation_command(command: &Self::Command) -> bool {
        matches!(command, ProductCommand::ListProduct { .. })
    }

    fn handle_create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::ListProduct {
                product_id,
                name,
                price_cents,
                initial_stock,
            } => {
                if name.trim().is_empty() {
                    return Err(ProductError::EmptyName);
                }
                if *price_cents < 0 {
                    return Err(ProductError::NegativePrice(*price_cents));
                }
                if *initial_stock < 0 {
                    return Err(ProductError::InvalidQuantity(*initial_stock));
                }

                Ok(vec![ProductEvent::Listed(ProductListed {
                    product_id: *product_id,
                    name: name.clone(),
                    price_cents: *price_cents,
                    initial_stock: *initial_stock,
                })])
            }
            _ => Err(ProductError::NotListed),
        }
    }

    fn apply_first(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            ProductEvent::Listed(e) => Ok(Self {
                id: e.product_id,
                version: 0,
                name: e.name.clone(),
                price_cents: e.price_cents,
                on_hand: e.initial_stock,
                reservations: HashMap::new(),
                released: HashSet::new(),
            }),
            _ => Err(ProductError::NotListed),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::Listed(_) => {}
            ProductEvent::PriceChanged(e) => {
                self.price_cents = e.price_cents;
            }
            ProductEvent::StockReserved(e) => {
                self.reservations.insert(e.reservation_id, e.quantity);
            }
            ProductEvent::StockReleased(e) => {
                self.reservations.remove(&e.reservation_id);
                self.released.insert(e.reservation_id);
            }
            ProductEvent::StockReplenished(e) => {
                self.on_hand += e.quantity;
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::ListProduct { .. } => Err(ProductError::AlreadyListed),

            ProductCommand::ChangePrice { price_cents } => {
                if *price_cents < 0 {
                    return Err(ProductError::NegativePrice(*price_cents));
                }

                Ok(vec![ProductEvent::PriceChanged(ProductPriceChanged {
                    price_cents: *price_cents,
                })])
            }

            ProductCommand::ReserveStock {
                reservation_id,
                quantity,
            } => {
                // Redelivered reservation: the hold already exists
                if self.reservations.contains_key(reservation_id) {
                    return Ok(vec![]);
                }

                if *quantity <= 0 {
                    return Err(ProductError::InvalidQuantity(*quantity));
                }
                if *quantity > self.available() {
                    return Err(ProductError::InsufficientStock {
                        requested: *quantity,
                        available: self.available(),
                    });
                }

                Ok(vec![ProductEvent::StockReserved(StockReserved {
                    reservation_id: *reservation_id,
                    quantity: *quantity,
                })])
            }

            ProductCommand::ReleaseStock { reservation_id } => {
                // Repeat release of a known reservation is a no-op
                if self.released.contains(reservation_id) {
                    return Ok(vec![]);
                }
                if !self.reservations.contains_key(reservation_id) {
                    return Err(ProductError::UnknownReservation(*reservation_id));
                }

                Ok(vec![ProductEvent::StockReleased(StockReleased {
                    reservation_id: *reservation_id,
                })])
            }

            ProductCommand::ReplenishStock { quantity } => {
                if *quantity <= 0 {
                    return Err(ProductError::InvalidQuantity(*quantity));
                }

                Ok(vec![ProductEvent::StockReplenished(StockReplenished {
                    quantity: *quantity,
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

    fn envelope(
        aggregate_id: Uuid,
        version: i64,
        event: ProductEvent,
    ) -> EventEnvelope<ProductEvent> {
        EventEnvelope::new(
            aggregate_id,
            version,
            event.event_type().to_string(),
            event,
            Uuid::new_v4(),
            Utc::now(),
        )
    }

    fn listed(product_id: Uuid, stock: i32) -> Vec<EventEnvelope<ProductEvent>> {
        vec![envelope(
            product_id,
            1,
            ProductEvent::Listed(ProductListed {
                product_id,
                name: "Espresso beans".to_string(),
                price_cents: 1450,
                initial_stock: stock,
            }),
        )]
    }

    #[test]
    fn test_reserve_reduces_availability_not_on_hand() {
        let product_id = Uuid::new_v4();
        let reservation_id = Uuid::new_v4();
        let mut events = listed(product_id, 10);
        events.push(envelope(
            product_id,
            2,
            ProductEvent::StockReserved(StockReserved {
                reservation_id,
                quantity: 4,
            }),
        ));

        let product = ProductAggregate::rehydrate(&events).unwrap();
        assert_eq!(product.on_hand, 10);
        assert_eq!(product.held(), 4);
        assert_eq!(product.available(), 6);
    }

    #[test]
    fn test_reserve_beyond_availability_is_rejected() {
        let product = ProductAggregate::rehydrate(&listed(Uuid::new_v4(), 3)).unwrap();

        let result = product.handle(&ProductCommand::ReserveStock {
            reservation_id: Uuid::new_v4(),
            quantity: 5,
        });

        assert!(matches!(
            result,
            Err(ProductError::InsufficientStock {
                requested: 5,
                available: 3
            })
        ));
    }

    #[test]
    fn test_redelivered_reserve_is_noop() {
        let product_id = Uuid::new_v4();
        let reservation_id = Uuid::new_v4();
        let mut events = listed(product_id, 10);
        events.push(envelope(
            product_id,
            2,
            ProductEvent::StockReserved(StockReserved {
                reservation_id,
                quantity: 2,
            }),
        ));

        let product = ProductAggregate::rehydrate(&events).unwrap();
        let new_events = product
            .handle(&ProductCommand::ReserveStock {
                reservation_id,
                quantity: 2,
            })
            .unwrap();
        assert!(new_events.is_empty());
    }

    #[test]
    fn test_release_restores_availability_and_is_idempotent() {
        let product_id = Uuid::new_v4();
        let reservation_id = Uuid::new_v4();
        let mut events = listed(product_id, 10);
        events.push(envelope(
            product_id,
            2,
            ProductEvent::StockReserved(StockReserved {
                reservation_id,
                quantity: 4,
            }),
        ));
        events.push(envelope(
            product_id,
            3,
            ProductEvent::StockReleased(StockReleased { reservation_id }),
        ));

        let product = ProductAggregate::rehydrate(&events).unwrap();
        assert_eq!(product.available(), 10);

        // Redelivered release
        let repeat = product
            .handle(&ProductCommand::ReleaseStock { reservation_id })
            .unwrap();
        assert!(repeat.is_empty());

        // A reservation that never existed is still an error
        let unknown = Uuid::new_v4();
        assert!(matches!(
            product.handle(&ProductCommand::ReleaseStock {
                reservation_id: unknown
            }),
            Err(ProductError::UnknownReservation(id)) if id == unknown
        ));
    }
}
