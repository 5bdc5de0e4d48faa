use uuid::Uuid;

// ============================================================================
// Catalog Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum ProductCommand {
    ListProduct {
        product_id: Uuid,
        name: String,
        price_cents: i64,
        initial_stock: i32,
    },
    ChangePrice {
        price_cents: i64,
    },
    ReserveStock {
        reservation_id: Uuid,
        quantity: i32,
    },
    ReleaseStock {
        reservation_id: Uuid,
    },
    ReplenishStock {
        quantity: i32,
    },
}
