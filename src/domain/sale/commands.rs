use uuid::Uuid;

use super::value_objects::SaleLine;

// ============================================================================
// Sale Commands - User Intent
// ============================================================================

#[derive(Debug, Clone)]
pub enum SaleCommand {
    StartSale {
        sale_id: Uuid,
        customer_id: Uuid,
    },
    AddLine {
        line: SaleLine,
    },
    RemoveLine {
        product_id: Uuid,
    },
    ApplyDiscount {
        percent: i32,
    },
    FinalizeSale,
    CancelSale {
        reason: Option<String>,
    },
}
