use uuid::Uuid;

// ============================================================================
// Sale Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SaleError {
    #[error("sale has already been started")]
    AlreadyStarted,

    #[error("sale is already finalized")]
    AlreadyFinalized,

    #[error("sale is already cancelled")]
    AlreadyCancelled,

    #[error("sale does not exist yet")]
    NotStarted,

    #[error("cannot finalize a sale with no lines")]
    EmptySale,

    #[error("invalid line quantity: {0}")]
    InvalidQuantity(i32),

    #[error("invalid unit price: {0}")]
    InvalidUnitPrice(i64),

    #[error("discount percent must be in [0, 100], got {0}")]
    InvalidDiscount(i32),

    #[error("no line for product {0}")]
    UnknownLine(Uuid),
}
