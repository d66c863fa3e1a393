//! Notification domain module: the alert feed and stock threshold
//! classification.

pub mod engine;
pub mod notification;
pub mod thresholds;

pub use engine::{NotificationEngine, NotificationFilter};
pub use notification::{
    Notification, NotificationDeleted, NotificationEvent, NotificationKind, NotificationRaised,
    NotificationRead,
};
pub use thresholds::{StockLevel, StockThresholds};
