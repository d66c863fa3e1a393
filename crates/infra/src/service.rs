//! Single-writer service over the in-memory stores.
//!
//! ```text
//! command
//!   ↓
//! 1. take the write guard (one critical section per command)
//!   ↓
//! 2. decide + apply against the stores (all-or-nothing per command)
//!   ↓
//! 3. record the committed events and seal them into envelopes
//!   ↓
//! 4. drop the guard, then publish the envelopes to the bus
//! ```
//!
//! Queries take the read guard, so they may run alongside each other but
//! never observe a half-applied command.

use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error, info, warn};

use atelier_catalog::{Category, CatalogStore, Item, ItemChanges, ItemEvent, ItemFilter, NewItem};
use atelier_core::{
    CategoryId, Currency, CustomerId, DomainError, DomainResult, ItemId, MoldId, Money,
    NotificationId, SaleId,
};
use atelier_customers::{Customer, CustomerStore, NewCustomer};
use atelier_events::{ChangeSet, EventBus, EventEnvelope};
use atelier_molds::{Mold, MoldChanges, MoldEvent, MoldStatus, MoldStore, NewMold};
use atelier_notifications::{
    Notification, NotificationEngine, NotificationEvent, NotificationFilter, StockThresholds,
};
use atelier_sales::{Sale, SaleLedger, SaleOutcome, SaleQuery, SaleRequest, SaleStatus, SalesEngine};

use crate::config::AtelierConfig;

/// Envelope type handed to the bus and the persistence writer.
pub type JsonEnvelope = EventEnvelope<JsonValue>;

pub const ITEM_RECORD: &str = "catalog.item";
pub const MOLD_RECORD: &str = "molds.mold";
pub const CUSTOMER_RECORD: &str = "customers.customer";
pub const SALE_RECORD: &str = "sales.sale";
pub const NOTIFICATION_RECORD: &str = "notifications.notification";

/// An item as the catalog screens show it: the record plus the name of the
/// stock level it currently falls in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub stock_level: String,
}

#[derive(Debug, Default)]
struct Stores {
    catalog: CatalogStore,
    molds: MoldStore,
    customers: CustomerStore,
    ledger: SaleLedger,
    notifications: NotificationEngine,
    last_sequence: u64,
}

impl Stores {
    fn sales(&mut self) -> SalesEngine<'_> {
        SalesEngine::new(
            &mut self.catalog,
            &mut self.customers,
            &mut self.ledger,
            &mut self.notifications,
        )
    }

    /// Re-check every item whose stock moved against the low-stock level.
    fn evaluate_stock(
        &mut self,
        events: &[ItemEvent],
        at: DateTime<Utc>,
        changes: &mut ChangeSet,
    ) -> DomainResult<()> {
        let touched: BTreeSet<ItemId> = events
            .iter()
            .filter(|e| e.touches_stock())
            .map(ItemEvent::item_id)
            .collect();
        for item_id in touched {
            let raised = self.notifications.evaluate_stock(&self.catalog, item_id, at)?;
            changes.record(NOTIFICATION_RECORD, &raised);
        }
        Ok(())
    }

    fn view(&self, item: Item) -> ItemView {
        let stock_level = self.notifications.level_for(item.stock()).name.clone();
        ItemView { item, stock_level }
    }
}

fn record_outcome(changes: &mut ChangeSet, outcome: &SaleOutcome) {
    changes.record(ITEM_RECORD, &outcome.item_events);
    changes.record(CUSTOMER_RECORD, &outcome.customer_events);
    changes.record(SALE_RECORD, &outcome.sale_events);
    changes.record(NOTIFICATION_RECORD, &outcome.notification_events);
}

fn poisoned() -> DomainError {
    DomainError::invariant("store lock poisoned")
}

/// The core-facing interface: every store behind one lock, every committed
/// change published after the lock is released.
#[derive(Debug)]
pub struct CoreService<B> {
    stores: RwLock<Stores>,
    bus: B,
}

impl<B> CoreService<B>
where
    B: EventBus<JsonEnvelope>,
{
    pub fn new(bus: B, thresholds: StockThresholds, currency: Currency) -> Self {
        let stores = Stores {
            notifications: NotificationEngine::new(thresholds, currency),
            ..Stores::default()
        };
        Self {
            stores: RwLock::new(stores),
            bus,
        }
    }

    pub fn from_config(config: &AtelierConfig, bus: B) -> Self {
        Self::new(bus, config.stock_levels.clone(), config.currency.clone())
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Sequence number of the last sealed envelope.
    pub fn last_sequence(&self) -> DomainResult<u64> {
        self.read(|s| s.last_sequence)
    }

    fn read<T>(&self, f: impl FnOnce(&Stores) -> T) -> DomainResult<T> {
        let guard: RwLockReadGuard<'_, Stores> = self.stores.read().map_err(|_| poisoned())?;
        Ok(f(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut Stores, DateTime<Utc>, &mut ChangeSet) -> DomainResult<T>,
    ) -> DomainResult<T> {
        let at = Utc::now();
        let (value, envelopes) = {
            let mut guard: RwLockWriteGuard<'_, Stores> =
                self.stores.write().map_err(|_| poisoned())?;
            let stores = &mut *guard;
            let mut changes = ChangeSet::new();
            let value = f(stores, at, &mut changes)?;
            (value, changes.seal(&mut stores.last_sequence))
        };

        for envelope in envelopes {
            let sequence = envelope.sequence_number();
            let event_type = envelope.event_type().to_string();
            match self.bus.publish(envelope) {
                Ok(0) => warn!(sequence, event_type = %event_type, "committed envelope reached no subscriber"),
                Ok(_) => {}
                // The in-memory commit stands; only its persisted copy is lost.
                Err(err) => error!(
                    sequence,
                    event_type = %event_type,
                    error = ?err,
                    "failed to publish committed envelope; it will not be persisted"
                ),
            }
        }
        Ok(value)
    }

    // --- sales ---------------------------------------------------------------

    pub fn submit_sale(&self, request: SaleRequest) -> DomainResult<Sale> {
        let customer_id = request.customer_id;
        let line_count = request.lines.len();
        self.write(|s, at, changes| {
            let outcome = s.sales().submit_sale(request, at).inspect_err(|err| {
                warn!(%customer_id, lines = line_count, error = %err, "sale rejected");
            })?;
            record_outcome(changes, &outcome);
            info!(
                sale_id = %outcome.sale.id_typed(),
                %customer_id,
                total = outcome.sale.total().minor_units(),
                lines = line_count,
                "sale committed"
            );
            Ok(outcome.sale)
        })
    }

    pub fn advance_sale(&self, sale_id: SaleId, status: SaleStatus) -> DomainResult<Sale> {
        self.write(|s, at, changes| {
            let outcome = s.sales().advance_sale(sale_id, status, at)?;
            record_outcome(changes, &outcome);
            info!(%sale_id, status = %status, "sale status changed");
            Ok(outcome.sale)
        })
    }

    pub fn cancel_sale(&self, sale_id: SaleId) -> DomainResult<Sale> {
        self.write(|s, at, changes| {
            let outcome = s.sales().cancel_sale(sale_id, at)?;
            record_outcome(changes, &outcome);
            info!(%sale_id, restocked_items = outcome.item_events.len(), "sale cancelled");
            Ok(outcome.sale)
        })
    }

    pub fn get_sale(&self, sale_id: SaleId) -> DomainResult<Sale> {
        self.read(|s| s.ledger.require(sale_id).cloned())?
    }

    pub fn list_sales(&self, query: &SaleQuery) -> DomainResult<Vec<Sale>> {
        self.read(|s| s.ledger.list(query).cloned().collect())
    }

    // --- catalog -------------------------------------------------------------

    pub fn create_item(&self, new: NewItem) -> DomainResult<Item> {
        self.write(|s, at, changes| {
            let id = ItemId::new();
            let events = s.catalog.create_item(id, new, at)?;
            changes.record(ITEM_RECORD, &events);
            s.evaluate_stock(&events, at, changes)?;
            let item = s.catalog.require(id)?.clone();
            info!(item_id = %id, name = item.name(), stock = item.stock(), "item created");
            Ok(item)
        })
    }

    pub fn update_item(&self, item_id: ItemId, update: ItemChanges) -> DomainResult<Item> {
        self.write(|s, at, changes| {
            let events = s.catalog.update_item(item_id, update, at)?;
            changes.record(ITEM_RECORD, &events);
            info!(%item_id, "item updated");
            s.catalog.require(item_id).cloned()
        })
    }

    pub fn set_stock(&self, item_id: ItemId, stock: i64) -> DomainResult<Item> {
        self.write(|s, at, changes| {
            let events = s.catalog.set_stock(item_id, stock, at)?;
            changes.record(ITEM_RECORD, &events);
            s.evaluate_stock(&events, at, changes)?;
            info!(%item_id, stock, "stock set");
            s.catalog.require(item_id).cloned()
        })
    }

    pub fn set_item_active(&self, item_id: ItemId, active: bool) -> DomainResult<Item> {
        self.write(|s, at, changes| {
            let events = s.catalog.set_active(item_id, active, at)?;
            if events.is_empty() {
                debug!(%item_id, active, "item already in requested state");
            }
            changes.record(ITEM_RECORD, &events);
            s.catalog.require(item_id).cloned()
        })
    }

    pub fn get_item(&self, item_id: ItemId) -> DomainResult<Item> {
        self.read(|s| s.catalog.require(item_id).cloned())?
    }

    pub fn find_active_items(&self, filter: &ItemFilter) -> DomainResult<Vec<Item>> {
        self.read(|s| {
            s.catalog
                .find_active(filter)
                .map(|items| items.cloned().collect())
        })?
    }

    pub fn inventory_value(&self, category: Option<CategoryId>) -> DomainResult<Money> {
        self.read(|s| s.catalog.inventory_value(category))?
    }

    /// Items whose price was never filled in, active or not.
    pub fn zero_priced_items(&self) -> DomainResult<Vec<Item>> {
        self.read(|s| s.catalog.zero_priced().cloned().collect())
    }

    /// Attach the current stock level name to each item.
    pub fn item_views(&self, items: Vec<Item>) -> DomainResult<Vec<ItemView>> {
        self.read(|s| items.into_iter().map(|item| s.view(item)).collect())
    }

    pub fn item_view(&self, item: Item) -> DomainResult<ItemView> {
        self.read(|s| s.view(item))
    }

    pub fn add_category(&self, name: String, parent: Option<CategoryId>) -> DomainResult<Category> {
        self.write(|s, _, _| {
            let category = s.catalog.add_category(CategoryId::new(), name, parent)?;
            info!(category_id = %category.id, name = %category.name, "category added");
            Ok(category)
        })
    }

    pub fn move_category(&self, id: CategoryId, parent: Option<CategoryId>) -> DomainResult<()> {
        self.write(|s, _, _| {
            s.catalog.move_category(id, parent)?;
            info!(category_id = %id, parent = ?parent, "category moved");
            Ok(())
        })
    }

    /// The category itself plus every descendant, breadth first.
    pub fn category_with_descendants(&self, id: CategoryId) -> DomainResult<Vec<CategoryId>> {
        self.read(|s| s.catalog.categories().descendants_of(id))?
    }

    // --- molds ---------------------------------------------------------------

    pub fn register_mold(&self, new: NewMold) -> DomainResult<Mold> {
        self.write(|s, at, changes| {
            let id = MoldId::new();
            let events = s.molds.register_mold(id, new, at)?;
            changes.record(MOLD_RECORD, &events);
            let mold = s.molds.require(id)?.clone();
            info!(mold_id = %id, code = mold.code(), "mold registered");
            Ok(mold)
        })
    }

    pub fn update_mold(&self, mold_id: MoldId, changes: MoldChanges) -> DomainResult<Mold> {
        self.mold_command(mold_id, |molds, at| molds.update_mold(mold_id, changes, at))
    }

    /// Remove a mold and every link it held. Returns the removed mold.
    pub fn remove_mold(&self, mold_id: MoldId) -> DomainResult<Mold> {
        self.write(|s, at, changes| {
            let removed = s.molds.require(mold_id)?.clone();
            let events = s.molds.remove_mold(mold_id, at)?;
            changes.record(MOLD_RECORD, &events);
            info!(%mold_id, code = removed.code(), links = removed.items().len(), "mold removed");
            Ok(removed)
        })
    }

    pub fn record_mold_usage(&self, mold_id: MoldId) -> DomainResult<Mold> {
        self.mold_command(mold_id, |molds, at| molds.record_usage(mold_id, at))
    }

    pub fn reset_mold_usage(&self, mold_id: MoldId) -> DomainResult<Mold> {
        self.mold_command(mold_id, |molds, at| molds.reset_usage(mold_id, at))
    }

    /// Link an item that exists in the catalog. Linking twice is a no-op.
    pub fn link_mold_item(&self, mold_id: MoldId, item_id: ItemId) -> DomainResult<Mold> {
        self.write(|s, at, changes| {
            s.catalog.require(item_id)?;
            let events = s.molds.link_item(mold_id, item_id, at)?;
            log_mold_events(mold_id, &events);
            changes.record(MOLD_RECORD, &events);
            s.molds.require(mold_id).cloned()
        })
    }

    /// Unlinking a pair that is not linked is a no-op.
    pub fn unlink_mold_item(&self, mold_id: MoldId, item_id: ItemId) -> DomainResult<Mold> {
        self.mold_command(mold_id, |molds, at| molds.unlink_item(mold_id, item_id, at))
    }

    pub fn change_mold_status(
        &self,
        mold_id: MoldId,
        status: MoldStatus,
        note: Option<String>,
    ) -> DomainResult<Mold> {
        self.mold_command(mold_id, |molds, at| molds.change_status(mold_id, status, note, at))
    }

    pub fn get_mold(&self, mold_id: MoldId) -> DomainResult<Mold> {
        self.read(|s| s.molds.require(mold_id).cloned())?
    }

    pub fn find_mold_by_code(&self, code: &str) -> DomainResult<Mold> {
        self.read(|s| {
            s.molds
                .find_by_code(code)
                .cloned()
                .ok_or_else(|| DomainError::not_found("mold", code.trim()))
        })?
    }

    pub fn list_molds(&self) -> DomainResult<Vec<Mold>> {
        self.read(|s| s.molds.list().cloned().collect())
    }

    pub fn molds_for_item(&self, item_id: ItemId) -> DomainResult<Vec<Mold>> {
        self.read(|s| s.molds.molds_for_item(item_id).cloned().collect())
    }

    fn mold_command(
        &self,
        mold_id: MoldId,
        f: impl FnOnce(&mut MoldStore, DateTime<Utc>) -> DomainResult<Vec<MoldEvent>>,
    ) -> DomainResult<Mold> {
        self.write(|s, at, changes| {
            let events = f(&mut s.molds, at)?;
            log_mold_events(mold_id, &events);
            changes.record(MOLD_RECORD, &events);
            s.molds.require(mold_id).cloned()
        })
    }

    // --- customers -----------------------------------------------------------

    pub fn register_customer(&self, new: NewCustomer) -> DomainResult<Customer> {
        self.write(|s, at, changes| {
            let id = CustomerId::new();
            let events = s.customers.register(id, new, at)?;
            changes.record(CUSTOMER_RECORD, &events);
            info!(customer_id = %id, "customer registered");
            s.customers.require(id).cloned()
        })
    }

    /// Replace name and contact details; purchase statistics are untouched.
    pub fn update_customer(&self, customer_id: CustomerId, update: NewCustomer) -> DomainResult<Customer> {
        self.write(|s, at, changes| {
            let events = s
                .customers
                .update_contact(customer_id, update.name, update.contact, at)?;
            changes.record(CUSTOMER_RECORD, &events);
            info!(%customer_id, "customer updated");
            s.customers.require(customer_id).cloned()
        })
    }

    /// Remove a customer. Customers with recorded purchases stay, since
    /// their sales keep naming them.
    pub fn remove_customer(&self, customer_id: CustomerId) -> DomainResult<Customer> {
        self.write(|s, at, changes| {
            let removed = s.customers.require(customer_id)?.clone();
            let events = s.customers.remove(customer_id, at).inspect_err(|err| {
                warn!(%customer_id, error = %err, "customer removal rejected");
            })?;
            changes.record(CUSTOMER_RECORD, &events);
            info!(%customer_id, "customer removed");
            Ok(removed)
        })
    }

    pub fn get_customer(&self, customer_id: CustomerId) -> DomainResult<Customer> {
        self.read(|s| s.customers.require(customer_id).cloned())?
    }

    pub fn list_customers(&self) -> DomainResult<Vec<Customer>> {
        self.read(|s| s.customers.list().cloned().collect())
    }

    // --- notifications -------------------------------------------------------

    /// Post a system notification (e.g. the startup greeting).
    pub fn notify_system(&self, title: &str, message: &str) -> DomainResult<Notification> {
        self.write(|s, at, changes| {
            let events = s.notifications.notify_system(title, message, at);
            changes.record(NOTIFICATION_RECORD, &events);
            match events.first() {
                Some(NotificationEvent::Raised(raised)) => Ok(raised.notification.clone()),
                _ => Err(DomainError::invariant("system notification was not raised")),
            }
        })
    }

    pub fn list_notifications(&self, filter: &NotificationFilter) -> DomainResult<Vec<Notification>> {
        self.read(|s| s.notifications.list(filter).cloned().collect())
    }

    pub fn unread_notifications(&self) -> DomainResult<usize> {
        self.read(|s| s.notifications.unread_count())
    }

    /// Unknown or already-read ids are a no-op.
    pub fn mark_read(&self, id: NotificationId) -> DomainResult<bool> {
        self.notification_command(|n, at| n.mark_read(id, at))
            .map(|changed| changed > 0)
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&self) -> DomainResult<usize> {
        self.notification_command(|n, at| n.mark_all_read(at))
    }

    pub fn delete_notification(&self, id: NotificationId) -> DomainResult<bool> {
        self.notification_command(|n, at| n.delete(id, at))
            .map(|changed| changed > 0)
    }

    /// Swap the stock levels and re-evaluate every item against them.
    pub fn set_thresholds(&self, thresholds: StockThresholds) -> DomainResult<usize> {
        self.write(|s, at, changes| {
            s.notifications.set_thresholds(thresholds);
            let raised = s.notifications.evaluate_all(&s.catalog, at);
            changes.record(NOTIFICATION_RECORD, &raised);
            info!(
                levels = s.notifications.thresholds().levels().len(),
                raised = raised.len(),
                "stock thresholds replaced"
            );
            Ok(raised.len())
        })
    }

    /// Raise any missing low-stock alerts (e.g. at startup).
    pub fn evaluate_stock_alerts(&self) -> DomainResult<usize> {
        self.write(|s, at, changes| {
            let raised = s.notifications.evaluate_all(&s.catalog, at);
            changes.record(NOTIFICATION_RECORD, &raised);
            Ok(raised.len())
        })
    }

    pub fn thresholds(&self) -> DomainResult<StockThresholds> {
        self.read(|s| s.notifications.thresholds().clone())
    }

    fn notification_command(
        &self,
        f: impl FnOnce(&mut NotificationEngine, DateTime<Utc>) -> Vec<NotificationEvent>,
    ) -> DomainResult<usize> {
        self.write(|s, at, changes| {
            let events = f(&mut s.notifications, at);
            if events.is_empty() {
                debug!("notification command changed nothing");
            }
            changes.record(NOTIFICATION_RECORD, &events);
            Ok(events.len())
        })
    }
}

fn log_mold_events(mold_id: MoldId, events: &[MoldEvent]) {
    if events.is_empty() {
        debug!(%mold_id, "mold command was a no-op");
    }
    for ev in events {
        info!(%mold_id, event_type = atelier_events::Event::event_type(ev), "mold changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use atelier_events::InMemoryEventBus;

    type Service = CoreService<Arc<InMemoryEventBus<JsonEnvelope>>>;

    fn service() -> Service {
        CoreService::new(
            Arc::new(InMemoryEventBus::new()),
            StockThresholds::default(),
            Currency::default(),
        )
    }

    fn new_item(stock: i64) -> NewItem {
        NewItem {
            name: "Pendientes".to_string(),
            description: String::new(),
            price: Money::from_minor(4_500),
            stock,
            active: true,
            category_id: None,
            materials: vec!["plata".to_string()],
        }
    }

    #[test]
    fn envelopes_are_published_after_commit_in_sequence() {
        let svc = service();
        let sub = svc.bus().subscribe();

        let item = svc.create_item(new_item(20)).unwrap();
        svc.set_stock(item.id_typed(), 25).unwrap();

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert!(sub.try_recv().is_err());
        assert_eq!(first.record_type(), ITEM_RECORD);
        assert_eq!(first.event_type(), "catalog.item.created");
        assert_eq!((first.sequence_number(), second.sequence_number()), (1, 2));
        assert_eq!(svc.last_sequence().unwrap(), 2);
    }

    #[test]
    fn rejected_command_publishes_nothing() {
        let svc = service();
        let sub = svc.bus().subscribe();

        assert!(matches!(
            svc.set_stock(ItemId::new(), 3),
            Err(DomainError::NotFound { entity: "item", .. })
        ));
        assert!(sub.try_recv().is_err());
        assert_eq!(svc.last_sequence().unwrap(), 0);
    }

    #[test]
    fn low_stock_edit_raises_alert() {
        let svc = service();
        let item = svc.create_item(new_item(20)).unwrap();
        assert_eq!(svc.unread_notifications().unwrap(), 0);

        svc.set_stock(item.id_typed(), 2).unwrap();
        svc.set_stock(item.id_typed(), 1).unwrap();
        assert_eq!(svc.unread_notifications().unwrap(), 1);
    }

    #[test]
    fn linking_requires_a_catalog_item() {
        let svc = service();
        let mold = svc
            .register_mold(NewMold {
                code: "M-01".to_string(),
                name: "Anillo base".to_string(),
                description: String::new(),
                location: None,
                material: None,
                status: MoldStatus::Stored,
            })
            .unwrap();

        assert!(matches!(
            svc.link_mold_item(mold.id_typed(), ItemId::new()),
            Err(DomainError::NotFound { entity: "item", .. })
        ));

        let item = svc.create_item(new_item(5)).unwrap();
        svc.link_mold_item(mold.id_typed(), item.id_typed()).unwrap();
        svc.link_mold_item(mold.id_typed(), item.id_typed()).unwrap();
        assert_eq!(svc.molds_for_item(item.id_typed()).unwrap().len(), 1);
    }

    #[derive(Debug, Default)]
    struct BrokenBus;

    #[derive(Debug)]
    struct BrokenBusError;

    impl EventBus<JsonEnvelope> for BrokenBus {
        type Error = BrokenBusError;

        fn publish(&self, _message: JsonEnvelope) -> Result<usize, Self::Error> {
            Err(BrokenBusError)
        }

        fn subscribe(&self) -> atelier_events::Subscription<JsonEnvelope> {
            let (_tx, rx) = std::sync::mpsc::channel();
            atelier_events::Subscription::new(rx)
        }
    }

    fn new_mold(code: &str) -> NewMold {
        NewMold {
            code: code.to_string(),
            name: "Anillo base".to_string(),
            description: String::new(),
            location: None,
            material: None,
            status: MoldStatus::Stored,
        }
    }

    #[test]
    fn failed_publish_keeps_the_commit() {
        let svc = CoreService::new(BrokenBus, StockThresholds::default(), Currency::default());

        let item = svc.create_item(new_item(20)).unwrap();
        assert_eq!(svc.get_item(item.id_typed()).unwrap().stock(), 20);
        assert_eq!(svc.last_sequence().unwrap(), 1);

        svc.set_stock(item.id_typed(), 8).unwrap();
        assert_eq!(svc.last_sequence().unwrap(), 2);
    }

    #[test]
    fn unsubscribed_commit_still_advances_the_sequence() {
        let svc = service();
        assert_eq!(svc.bus().subscriber_count(), 0);
        svc.create_item(new_item(20)).unwrap();
        assert_eq!(svc.last_sequence().unwrap(), 1);
    }

    #[test]
    fn mold_can_be_edited_found_by_code_and_removed() {
        let svc = service();
        let item = svc.create_item(new_item(5)).unwrap();
        let mold = svc.register_mold(new_mold("M-02")).unwrap();
        svc.link_mold_item(mold.id_typed(), item.id_typed()).unwrap();

        let updated = svc
            .update_mold(
                mold.id_typed(),
                MoldChanges {
                    name: "Anillo grabado".to_string(),
                    description: "con bisel".to_string(),
                    location: Some("Estante 3".to_string()),
                    material: None,
                },
            )
            .unwrap();
        assert_eq!(updated.name(), "Anillo grabado");
        assert_eq!(svc.find_mold_by_code(" M-02 ").unwrap().id_typed(), mold.id_typed());

        let sub = svc.bus().subscribe();
        let removed = svc.remove_mold(mold.id_typed()).unwrap();
        assert_eq!(removed.items().len(), 1);
        assert_eq!(sub.try_recv().unwrap().event_type(), "molds.mold.removed");

        assert!(svc.molds_for_item(item.id_typed()).unwrap().is_empty());
        assert!(matches!(
            svc.find_mold_by_code("M-02"),
            Err(DomainError::NotFound { entity: "mold", .. })
        ));
        svc.register_mold(new_mold("M-02")).unwrap();
    }

    #[test]
    fn customer_with_a_sale_cannot_be_removed() {
        let svc = service();
        let buyer = svc
            .register_customer(NewCustomer {
                name: "Ana".to_string(),
                contact: Default::default(),
            })
            .unwrap();
        let browser = svc
            .register_customer(NewCustomer {
                name: "Luis".to_string(),
                contact: Default::default(),
            })
            .unwrap();
        let item = svc.create_item(new_item(5)).unwrap();
        svc.submit_sale(SaleRequest {
            customer_id: buyer.id_typed(),
            lines: vec![atelier_sales::SaleLineRequest {
                item_id: item.id_typed(),
                quantity: 1,
            }],
            channel: Default::default(),
            notes: None,
        })
        .unwrap();

        assert!(matches!(
            svc.remove_customer(buyer.id_typed()),
            Err(DomainError::Conflict(_))
        ));
        assert_eq!(svc.list_customers().unwrap().len(), 2);

        svc.remove_customer(browser.id_typed()).unwrap();
        assert!(matches!(
            svc.get_customer(browser.id_typed()),
            Err(DomainError::NotFound { entity: "customer", .. })
        ));
    }

    #[test]
    fn item_views_carry_the_stock_level_name() {
        let svc = service();
        let low = svc.create_item(new_item(1)).unwrap();
        let mut free = new_item(30);
        free.price = Money::from_minor(0);
        let free = svc.create_item(free).unwrap();

        let zero = svc.zero_priced_items().unwrap();
        assert_eq!(zero.len(), 1);
        assert_eq!(zero[0].id_typed(), free.id_typed());

        let thresholds = svc.thresholds().unwrap();
        let low_view = svc.item_view(low).unwrap();
        assert_eq!(low_view.stock_level, thresholds.level_for(1).name);
        let views = svc.item_views(zero).unwrap();
        assert_eq!(views[0].stock_level, thresholds.level_for(30).name);
    }

    #[test]
    fn system_notification_is_unread_and_published() {
        let svc = service();
        let sub = svc.bus().subscribe();
        let note = svc.notify_system("Bienvenido", "Sistema listo").unwrap();

        assert_eq!(note.title, "Bienvenido");
        assert_eq!(svc.unread_notifications().unwrap(), 1);
        assert_eq!(sub.try_recv().unwrap().record_type(), NOTIFICATION_RECORD);
    }
}
