use uuid::Uuid;

// ============================================================================
// Customer Commands
// ============================================================================

#[derive(Debug, Clone)]
pub enum CustomerCommand {
    RegisterCustomer {
        customer_id: Uuid,
        name: String,
        email: String,
    },
    ChangeContact {
        email: String,
    },
    DeactivateCustomer {
        reason: Option<String>,
    },
}
