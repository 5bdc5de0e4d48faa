use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::DomainEvent;

// ============================================================================
// Customer Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CustomerEvent {
    Registered(CustomerRegistered),
    ContactChanged(CustomerContactChanged),
    Deactivated(CustomerDeactivated),
}

impl DomainEvent for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::Registered(_) => "CustomerRegistered",
            CustomerEvent::ContactChanged(_) => "CustomerContactChanged",
            CustomerEvent::Deactivated(_) => "CustomerDeactivated",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomerRegistered {
    pub customer_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomerContactChanged {
    pub email: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CustomerDeactivated {
    pub reason: Option<String>,
}
