use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::core::Aggregate;

use super::commands::CustomerCommand;
use super::errors::CustomerError;
use super::events::*;

// ============================================================================
// Customer Aggregate
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub id: Uuid,
    pub version: i64,

    pub name: String,
    pub email: String,
    pub active: bool,
    pub deactivated_reason: Option<String>,
}

fn validate_email(email: &str) -> Result<(), CustomerError> {
    if email.trim().is_empty() || !email.contains('@') {
        return Err(CustomerError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

impl Aggregate for CustomerAggregate {
    type Event = CustomerEvent;
    type Command = CustomerCommand;
    type Error = CustomerError;

    fn aggregate_type() -> &'static str {
        "Customer"
    }

    fn is_creation_command(command: &Self::Command) -> bool {
        matches!(command, CustomerCommand::RegisterCustomer { .. })
    }

    fn handle_create(command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer {
                customer_id,
                name,
                email,
            } => {
                if name.trim().is_empty() {
                    return Err(CustomerError::EmptyName);
                }
                validate_email(email)?;

                Ok(vec![CustomerEvent::Registered(CustomerRegistered {
                    customer_id: *customer_id,
                    name: name.clone(),
                    email: email.clone(),
                })])
            }
            _ => Err(CustomerError::NotRegistered),
        }
    }

    fn apply_first(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            CustomerEvent::Registered(e) => Ok(Self {
                id: e.customer_id,
                version: 0,
                name: e.name.clone(),
                email: e.email.clone(),
                active: true,
                deactivated_reason: None,
            }),
            _ => Err(CustomerError::NotRegistered),
        }
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::Registered(_) => {}
            CustomerEvent::ContactChanged(e) => {
                self.email = e.email.clone();
            }
            CustomerEvent::Deactivated(e) => {
                self.active = false;
                self.deactivated_reason = e.reason.clone();
            }
        }
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer { .. } => Err(CustomerError::AlreadyRegistered),

            CustomerCommand::ChangeContact { email } => {
                if !self.active {
                    return Err(CustomerError::Deactivated);
                }
                validate_email(email)?;

                Ok(vec![CustomerEvent::ContactChanged(CustomerContactChanged {
                    email: email.clone(),
                })])
            }

            CustomerCommand::DeactivateCustomer { reason } => {
                // Retried deactivation is a no-op
                if !self.active {
                    return Ok(vec![]);
                }

                Ok(vec![CustomerEvent::Deactivated(CustomerDeactivated {
                    reason: reason.clone(),
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
