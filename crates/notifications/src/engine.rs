//! The alert feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_catalog::{CatalogStore, Item};
use atelier_core::{AggregateId, Currency, DomainResult, ItemId, NotificationId, SaleId};

use crate::notification::{
    Notification, NotificationDeleted, NotificationEvent, NotificationKind, NotificationRaised,
    NotificationRead,
};
use crate::thresholds::{StockLevel, StockThresholds};

/// Feed query. The default matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub unread_only: bool,
}

impl NotificationFilter {
    fn matches(&self, n: &Notification) -> bool {
        self.kind.is_none_or(|k| k == n.kind) && !(self.unread_only && n.read)
    }
}

/// Owns the feed and enforces stock alert deduplication: at most one unread
/// stock notification per item.
///
/// Read, mark and delete operations on unknown ids are no-ops.
#[derive(Debug, Clone, Default)]
pub struct NotificationEngine {
    /// Oldest first; listing walks it in reverse.
    feed: Vec<Notification>,
    thresholds: StockThresholds,
    currency: Currency,
}

impl NotificationEngine {
    pub fn new(thresholds: StockThresholds, currency: Currency) -> Self {
        Self {
            feed: Vec::new(),
            thresholds,
            currency,
        }
    }

    pub fn thresholds(&self) -> &StockThresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: StockThresholds) {
        self.thresholds = thresholds;
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn level_for(&self, stock: i64) -> &StockLevel {
        self.thresholds.level_for(stock)
    }

    /// Raise a stock alert for `item_id` if its stock is in the low level and
    /// no unread alert for it exists yet.
    pub fn evaluate_stock(
        &mut self,
        catalog: &CatalogStore,
        item_id: ItemId,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<NotificationEvent>> {
        let item = catalog.require(item_id)?;
        Ok(self.evaluate_item(item, at))
    }

    /// Same as `evaluate_stock` for an item the caller already holds.
    pub fn evaluate_item(&mut self, item: &Item, at: DateTime<Utc>) -> Vec<NotificationEvent> {
        if !self.thresholds.is_low(item.stock()) {
            return vec![];
        }

        let related: AggregateId = item.id_typed().into();
        if self.unread_stock_alert(related).is_some() {
            return vec![];
        }

        let message = format!(
            "Item \"{}\" is low on stock ({} units)",
            item.name(),
            item.stock()
        );
        vec![self.raise(
            NotificationKind::Stock,
            "Low stock",
            message,
            Some(related),
            at,
        )]
    }

    /// Re-evaluate every item (startup, threshold change).
    pub fn evaluate_all(&mut self, catalog: &CatalogStore, at: DateTime<Utc>) -> Vec<NotificationEvent> {
        catalog
            .list()
            .flat_map(|item| self.evaluate_item(item, at))
            .collect()
    }

    pub fn notify_sale(
        &mut self,
        sale_id: SaleId,
        title: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        vec![self.raise(
            NotificationKind::Sale,
            title,
            message,
            Some(sale_id.into()),
            at,
        )]
    }

    pub fn notify_system(
        &mut self,
        title: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Vec<NotificationEvent> {
        vec![self.raise(NotificationKind::System, title, message, None, at)]
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.feed.iter().find(|n| n.id == id)
    }

    /// Newest first.
    pub fn list<'a>(
        &'a self,
        filter: &NotificationFilter,
    ) -> impl Iterator<Item = &'a Notification> + use<'a> {
        let filter = *filter;
        self.feed.iter().rev().filter(move |n| filter.matches(n))
    }

    pub fn unread_count(&self) -> usize {
        self.feed.iter().filter(|n| !n.read).count()
    }

    pub fn mark_read(&mut self, id: NotificationId, at: DateTime<Utc>) -> Vec<NotificationEvent> {
        match self.feed.iter_mut().find(|n| n.id == id && !n.read) {
            Some(n) => {
                n.read = true;
                vec![NotificationEvent::Read(NotificationRead {
                    notification_id: id,
                    occurred_at: at,
                })]
            }
            None => vec![],
        }
    }

    pub fn mark_all_read(&mut self, at: DateTime<Utc>) -> Vec<NotificationEvent> {
        self.feed
            .iter_mut()
            .filter(|n| !n.read)
            .map(|n| {
                n.read = true;
                NotificationEvent::Read(NotificationRead {
                    notification_id: n.id,
                    occurred_at: at,
                })
            })
            .collect()
    }

    pub fn delete(&mut self, id: NotificationId, at: DateTime<Utc>) -> Vec<NotificationEvent> {
        let before = self.feed.len();
        self.feed.retain(|n| n.id != id);
        if self.feed.len() == before {
            return vec![];
        }
        vec![NotificationEvent::Deleted(NotificationDeleted {
            notification_id: id,
            occurred_at: at,
        })]
    }

    fn unread_stock_alert(&self, related: AggregateId) -> Option<&Notification> {
        self.feed
            .iter()
            .find(|n| n.kind == NotificationKind::Stock && !n.read && n.related_id == Some(related))
    }

    fn raise(
        &mut self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        related_id: Option<AggregateId>,
        at: DateTime<Utc>,
    ) -> NotificationEvent {
        let notification = Notification {
            id: NotificationId::new(),
            kind,
            title: title.into(),
            message: message.into(),
            related_id,
            read: false,
            created_at: at,
        };
        self.feed.push(notification.clone());
        NotificationEvent::Raised(NotificationRaised { notification })
    }
}
