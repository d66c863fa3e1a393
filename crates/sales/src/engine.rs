//! Sales engine: the multi-store commit.
//!
//! Every command follows the same discipline:
//!
//! 1. **Decide** everything that can fail (customer, stock, total, status).
//! 2. **Commit** the catalog change, itself all-or-nothing.
//! 3. **Apply** the already-decided sale and customer events, which cannot
//!    fail, then raise notifications.
//!
//! A rejected command therefore leaves every store exactly as it was.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_catalog::{CatalogStore, ItemEvent, Reservation};
use atelier_core::{Aggregate, CustomerId, DomainResult, ItemId, SaleId, ValidationError};
use atelier_customers::{CustomerEvent, CustomerStore};
use atelier_notifications::{NotificationEngine, NotificationEvent};

use crate::ledger::SaleLedger;
use crate::sale::{PlaceSale, Sale, SaleChannel, SaleEvent, SaleLine, SaleStatus};

/// One requested line. The price is never supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub item_id: ItemId,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRequest {
    pub customer_id: CustomerId,
    pub lines: Vec<SaleLineRequest>,
    #[serde(default)]
    pub channel: SaleChannel,
    #[serde(default)]
    pub notes: Option<String>,
}

/// The committed sale plus every event the commit produced, per store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleOutcome {
    pub sale: Sale,
    pub item_events: Vec<ItemEvent>,
    pub customer_events: Vec<CustomerEvent>,
    pub sale_events: Vec<SaleEvent>,
    pub notification_events: Vec<NotificationEvent>,
}

impl SaleOutcome {
    fn new(sale: Sale, sale_events: Vec<SaleEvent>) -> Self {
        Self {
            sale,
            item_events: Vec::new(),
            customer_events: Vec::new(),
            sale_events,
            notification_events: Vec::new(),
        }
    }
}

/// Borrows the stores for the duration of one command.
pub struct SalesEngine<'a> {
    catalog: &'a mut CatalogStore,
    customers: &'a mut CustomerStore,
    ledger: &'a mut SaleLedger,
    notifications: &'a mut NotificationEngine,
}

impl<'a> SalesEngine<'a> {
    pub fn new(
        catalog: &'a mut CatalogStore,
        customers: &'a mut CustomerStore,
        ledger: &'a mut SaleLedger,
        notifications: &'a mut NotificationEngine,
    ) -> Self {
        Self {
            catalog,
            customers,
            ledger,
            notifications,
        }
    }

    /// Validate and commit a sale, or reject it with no side effects.
    ///
    /// Validation stops at the first failing line. Lines for the same item
    /// are checked against their running total.
    pub fn submit_sale(&mut self, request: SaleRequest, at: DateTime<Utc>) -> DomainResult<SaleOutcome> {
        self.customers.require(request.customer_id)?;
        if request.lines.is_empty() {
            return Err(ValidationError::EmptySale.into());
        }

        let mut reservations: Vec<Reservation> = Vec::with_capacity(request.lines.len());
        let mut claimed: Vec<(ItemId, i64)> = Vec::new();
        for line in &request.lines {
            let reservation = self.catalog.reserve(line.item_id, line.quantity)?;

            let running = match claimed.iter_mut().find(|(id, _)| *id == line.item_id) {
                Some((_, total)) => {
                    *total = total
                        .checked_add(line.quantity)
                        .ok_or(ValidationError::AmountOverflow)?;
                    *total
                }
                None => {
                    claimed.push((line.item_id, line.quantity));
                    line.quantity
                }
            };
            if running != line.quantity {
                self.catalog.reserve(line.item_id, running)?;
            }

            reservations.push(reservation);
        }

        let sale_id = SaleId::new();
        let lines = reservations
            .iter()
            .zip(1u32..)
            .map(|(r, line_no)| SaleLine {
                line_no,
                item_id: r.item_id,
                quantity: r.quantity,
                unit_price: r.unit_price,
            })
            .collect();

        // Decide.
        let sale_events = self.ledger.decide_place(PlaceSale {
            sale_id,
            customer_id: request.customer_id,
            channel: request.channel,
            notes: request.notes,
            lines,
            occurred_at: at,
        })?;
        let customer_events = self
            .customers
            .decide_purchase(request.customer_id, sale_id, at)?;

        // Commit stock: the last step that may fail, all-or-nothing itself.
        let item_events = self.catalog.commit_reservations(&reservations, at)?;

        // Apply.
        let sale = self.apply_sale_events(Sale::empty(sale_id), &sale_events);
        self.customers.apply(&customer_events);

        let mut outcome = SaleOutcome::new(sale, sale_events);
        outcome.item_events = item_events;
        outcome.customer_events = customer_events;

        let touched: BTreeSet<ItemId> = outcome.sale.lines().iter().map(|l| l.item_id).collect();
        for item_id in touched {
            if let Some(item) = self.catalog.get(item_id) {
                outcome
                    .notification_events
                    .extend(self.notifications.evaluate_item(item, at));
            }
        }

        let total = self.notifications.currency().format(outcome.sale.total());
        outcome.notification_events.extend(self.notifications.notify_sale(
            sale_id,
            "New sale registered",
            format!("A new sale for {total} was registered"),
            at,
        ));

        Ok(outcome)
    }

    /// Move a sale forward in its status machine. Cancelling is delegated to
    /// `cancel_sale` so stock is always re-credited.
    pub fn advance_sale(
        &mut self,
        sale_id: SaleId,
        status: SaleStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<SaleOutcome> {
        if status == SaleStatus::Cancelled {
            return self.cancel_sale(sale_id, at);
        }

        let current = self.ledger.require(sale_id)?.clone();
        let sale_events = self.ledger.decide_transition(sale_id, status, at)?;

        let sale = self.apply_sale_events(current, &sale_events);
        let mut outcome = SaleOutcome::new(sale, sale_events);
        outcome.notification_events = self.status_notification(sale_id, status, at);
        Ok(outcome)
    }

    /// Cancel a pending or paid sale and put its stock back.
    ///
    /// The customer's purchase count is left as is.
    pub fn cancel_sale(&mut self, sale_id: SaleId, at: DateTime<Utc>) -> DomainResult<SaleOutcome> {
        let current = self.ledger.require(sale_id)?.clone();
        let sale_events = self
            .ledger
            .decide_transition(sale_id, SaleStatus::Cancelled, at)?;

        let lines: Vec<(ItemId, i64)> = current
            .lines()
            .iter()
            .map(|l| (l.item_id, l.quantity))
            .collect();
        let item_events = self.catalog.restock(&lines, at)?;

        let sale = self.apply_sale_events(current, &sale_events);
        let mut outcome = SaleOutcome::new(sale, sale_events);
        outcome.item_events = item_events;
        outcome.notification_events = self.status_notification(sale_id, SaleStatus::Cancelled, at);
        Ok(outcome)
    }

    fn apply_sale_events(&mut self, mut sale: Sale, events: &[SaleEvent]) -> Sale {
        self.ledger.apply(events);
        for ev in events {
            sale.apply(ev);
        }
        sale
    }

    fn status_notification(
        &mut self,
        sale_id: SaleId,
        status: SaleStatus,
        at: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        self.notifications.notify_sale(
            sale_id,
            "Sale status updated",
            format!("The sale is now {status}"),
            at,
        )
    }
}
