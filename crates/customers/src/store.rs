use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Aggregate, CustomerId, DomainError, DomainResult, SaleId};

use crate::customer::{
    ContactDetails, Customer, CustomerCommand, CustomerEvent, RecordPurchase, RegisterCustomer,
    RemoveCustomer, UpdateContact,
};

/// Input for `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactDetails,
}

/// In-memory customer store.
#[derive(Debug, Clone, Default)]
pub struct CustomerStore {
    customers: BTreeMap<CustomerId, Customer>,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.get(&id)
    }

    pub fn require(&self, id: CustomerId) -> DomainResult<&Customer> {
        self.customers
            .get(&id)
            .ok_or_else(|| DomainError::not_found("customer", id))
    }

    pub fn list(&self) -> impl Iterator<Item = &Customer> {
        self.customers.values()
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }

    pub fn register(
        &mut self,
        id: CustomerId,
        new: NewCustomer,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<CustomerEvent>> {
        if self.customers.contains_key(&id) {
            return Err(DomainError::conflict(format!("customer {id} already exists")));
        }
        let mut customer = Customer::empty(id);
        let events = customer.handle(&CustomerCommand::RegisterCustomer(RegisterCustomer {
            customer_id: id,
            name: new.name,
            contact: new.contact,
            occurred_at: at,
        }))?;
        for ev in &events {
            customer.apply(ev);
        }
        self.customers.insert(id, customer);
        Ok(events)
    }

    pub fn update_contact(
        &mut self,
        id: CustomerId,
        name: String,
        contact: ContactDetails,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<CustomerEvent>> {
        let events = self.require(id)?.handle(&CustomerCommand::UpdateContact(UpdateContact {
            customer_id: id,
            name,
            contact,
            occurred_at: at,
        }))?;
        self.apply(&events);
        Ok(events)
    }

    /// Decide the purchase rollup for a sale without touching the store.
    pub fn decide_purchase(
        &self,
        id: CustomerId,
        sale_id: SaleId,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<CustomerEvent>> {
        self.require(id)?
            .handle(&CustomerCommand::RecordPurchase(RecordPurchase {
                customer_id: id,
                sale_id,
                occurred_at: at,
            }))
    }

    /// Drop a customer that never bought anything.
    pub fn remove(&mut self, id: CustomerId, at: DateTime<Utc>) -> DomainResult<Vec<CustomerEvent>> {
        let events = self.require(id)?.handle(&CustomerCommand::RemoveCustomer(RemoveCustomer {
            customer_id: id,
            occurred_at: at,
        }))?;
        self.apply(&events);
        Ok(events)
    }

    /// Apply events decided earlier by this store.
    pub fn apply(&mut self, events: &[CustomerEvent]) {
        for ev in events {
            if let CustomerEvent::CustomerRemoved(removed) = ev {
                self.customers.remove(&removed.customer_id);
                continue;
            }
            if let Some(customer) = self.customers.get_mut(&ev.customer_id()) {
                customer.apply(ev);
            }
        }
    }

}
