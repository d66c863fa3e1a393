use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{AggregateId, NotificationId};
use atelier_events::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Stock,
    Sale,
    System,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotificationKind::Stock => "stock",
            NotificationKind::Sale => "sale",
            NotificationKind::System => "system",
        })
    }
}

/// A feed entry. `related_id` is a weak reference (id only) to the item or
/// sale the alert is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Option<AggregateId>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Event: NotificationRaised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRaised {
    pub notification: Notification,
}

/// Event: NotificationRead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRead {
    pub notification_id: NotificationId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: NotificationDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDeleted {
    pub notification_id: NotificationId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationEvent {
    Raised(NotificationRaised),
    Read(NotificationRead),
    Deleted(NotificationDeleted),
}

impl NotificationEvent {
    pub fn notification_id(&self) -> NotificationId {
        match self {
            NotificationEvent::Raised(e) => e.notification.id,
            NotificationEvent::Read(e) => e.notification_id,
            NotificationEvent::Deleted(e) => e.notification_id,
        }
    }
}

impl Event for NotificationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            NotificationEvent::Raised(_) => "notifications.notification.raised",
            NotificationEvent::Read(_) => "notifications.notification.read",
            NotificationEvent::Deleted(_) => "notifications.notification.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            NotificationEvent::Raised(e) => e.notification.created_at,
            NotificationEvent::Read(e) => e.occurred_at,
            NotificationEvent::Deleted(e) => e.occurred_at,
        }
    }

    fn record_id(&self) -> AggregateId {
        self.notification_id().into()
    }
}
