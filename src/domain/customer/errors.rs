// ============================================================================
// Customer Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CustomerError {
    #[error("customer is already registered")]
    AlreadyRegistered,

    #[error("customer does not exist yet")]
    NotRegistered,

    #[error("customer name cannot be empty")]
    EmptyName,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("customer is deactivated")]
    Deactivated,
}
