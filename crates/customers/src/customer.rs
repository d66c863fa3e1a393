use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, SaleId,
};
use atelier_events::Event;

/// Optional contact fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Aggregate root: Customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    id: CustomerId,
    name: String,
    contact: ContactDetails,
    total_purchases: u64,
    last_purchase_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Customer {
    pub fn empty(id: CustomerId) -> Self {
        Self {
            id,
            name: String::new(),
            contact: ContactDetails::default(),
            total_purchases: 0,
            last_purchase_at: None,
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CustomerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact(&self) -> &ContactDetails {
        &self.contact
    }

    pub fn total_purchases(&self) -> u64 {
        self.total_purchases
    }

    pub fn last_purchase_at(&self) -> Option<DateTime<Utc>> {
        self.last_purchase_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

}

impl AggregateRoot for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCustomer {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateContact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateContact {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPurchase (one per committed sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPurchase {
    pub customer_id: CustomerId,
    pub sale_id: SaleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveCustomer. Only customers without purchases can go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCustomer {
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerCommand {
    RegisterCustomer(RegisterCustomer),
    UpdateContact(UpdateContact),
    RecordPurchase(RecordPurchase),
    RemoveCustomer(RemoveCustomer),
}

/// Event: CustomerRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRegistered {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ContactUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdated {
    pub customer_id: CustomerId,
    pub name: String,
    pub contact: ContactDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecorded {
    pub customer_id: CustomerId,
    pub sale_id: SaleId,
    /// Rollup value after this purchase.
    pub total_purchases: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CustomerRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRemoved {
    pub customer_id: CustomerId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerEvent {
    CustomerRegistered(CustomerRegistered),
    ContactUpdated(ContactUpdated),
    PurchaseRecorded(PurchaseRecorded),
    CustomerRemoved(CustomerRemoved),
}

impl CustomerEvent {
    pub fn customer_id(&self) -> CustomerId {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.customer_id,
            CustomerEvent::ContactUpdated(e) => e.customer_id,
            CustomerEvent::PurchaseRecorded(e) => e.customer_id,
            CustomerEvent::CustomerRemoved(e) => e.customer_id,
        }
    }
}

impl Event for CustomerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CustomerEvent::CustomerRegistered(_) => "customers.customer.registered",
            CustomerEvent::ContactUpdated(_) => "customers.customer.contact_updated",
            CustomerEvent::PurchaseRecorded(_) => "customers.customer.purchase_recorded",
            CustomerEvent::CustomerRemoved(_) => "customers.customer.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CustomerEvent::CustomerRegistered(e) => e.occurred_at,
            CustomerEvent::ContactUpdated(e) => e.occurred_at,
            CustomerEvent::PurchaseRecorded(e) => e.occurred_at,
            CustomerEvent::CustomerRemoved(e) => e.occurred_at,
        }
    }

    fn record_id(&self) -> AggregateId {
        self.customer_id().into()
    }
}

impl Aggregate for Customer {
    type Command = CustomerCommand;
    type Event = CustomerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CustomerEvent::CustomerRegistered(e) => {
                self.id = e.customer_id;
                self.name = e.name.clone();
                self.contact = e.contact.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            CustomerEvent::ContactUpdated(e) => {
                self.name = e.name.clone();
                self.contact = e.contact.clone();
            }
            CustomerEvent::PurchaseRecorded(e) => {
                self.total_purchases = e.total_purchases;
                self.last_purchase_at = Some(e.occurred_at);
            }
            CustomerEvent::CustomerRemoved(_) => {
                self.created = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CustomerCommand::RegisterCustomer(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("customer already exists"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::validation("customer name cannot be empty"));
                }
                Ok(vec![CustomerEvent::CustomerRegistered(CustomerRegistered {
                    customer_id: cmd.customer_id,
                    name: cmd.name.trim().to_string(),
                    contact: cmd.contact.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustomerCommand::UpdateContact(cmd) => {
                self.ensure_created()?;
                if self.id != cmd.customer_id {
                    return Err(DomainError::invariant("customer_id mismatch"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::validation("customer name cannot be empty"));
                }
                Ok(vec![CustomerEvent::ContactUpdated(ContactUpdated {
                    customer_id: cmd.customer_id,
                    name: cmd.name.trim().to_string(),
                    contact: cmd.contact.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustomerCommand::RecordPurchase(cmd) => {
                self.ensure_created()?;
                if self.id != cmd.customer_id {
                    return Err(DomainError::invariant("customer_id mismatch"));
                }
                let total_purchases = self
                    .total_purchases
                    .checked_add(1)
                    .ok_or_else(|| DomainError::invariant("purchase counter overflow"))?;
                Ok(vec![CustomerEvent::PurchaseRecorded(PurchaseRecorded {
                    customer_id: cmd.customer_id,
                    sale_id: cmd.sale_id,
                    total_purchases,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CustomerCommand::RemoveCustomer(cmd) => {
                self.ensure_created()?;
                if self.id != cmd.customer_id {
                    return Err(DomainError::invariant("customer_id mismatch"));
                }
                // Every recorded purchase is a sale that still names this customer.
                if self.total_purchases > 0 {
                    return Err(DomainError::conflict(format!(
                        "customer has {} recorded purchase(s)",
                        self.total_purchases
                    )));
                }
                Ok(vec![CustomerEvent::CustomerRemoved(CustomerRemoved {
                    customer_id: cmd.customer_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Customer {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("customer", self.id));
        }
        Ok(())
    }
}
