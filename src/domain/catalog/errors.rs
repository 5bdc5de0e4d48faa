use uuid::Uuid;

// ============================================================================
// Catalog Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("product is already listed")]
    AlreadyListed,

    #[error("product does not exist yet")]
    NotListed,

    #[error("product name cannot be empty")]
    EmptyName,

    #[error("price cannot be negative: {0}")]
    NegativePrice(i64),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("unknown reservation: {0}")]
    UnknownReservation(Uuid),
}
