use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Sale Value Objects
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SaleLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleStatus {
    Open,
    Finalized,
    Cancelled,
}

impl SaleStatus {
    /// Finalized and cancelled sales accept no further business commands.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaleStatus::Finalized | SaleStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sale_line_serialization() {
        let line = SaleLine {
            product_id: Uuid::new_v4(),
            quantity: 3,
            unit_price_cents: 1299,
        };

        let json = serde_json::to_string(&line).unwrap();
        let restored: SaleLine = serde_json::from_str(&json).unwrap();
        assert_eq!(line, restored);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SaleStatus::Open.is_terminal());
        assert!(SaleStatus::Finalized.is_terminal());
        assert!(SaleStatus::Cancelled.is_terminal());
    }
}
