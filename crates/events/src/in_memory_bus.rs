//! Process-local fan-out of committed envelopes.
//!
//! Each subscriber owns an mpsc channel. Publishing walks the subscriber
//! table once, hands every live subscriber its own clone and forgets the
//! ones whose receiving half is gone. The returned count lets the writer
//! notice a commit that nobody (not even the persistence worker) saw.

use std::sync::{Mutex, MutexGuard, mpsc};

use thiserror::Error;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InMemoryBusError {
    #[error("subscriber table lock poisoned")]
    Poisoned,
}

#[derive(Debug)]
struct Subscriber<M> {
    id: u64,
    tx: mpsc::Sender<M>,
}

#[derive(Debug)]
struct Table<M> {
    next_id: u64,
    subscribers: Vec<Subscriber<M>>,
}

#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    table: Mutex<Table<M>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribers still registered. Disconnected ones are only noticed
    /// (and dropped) by the next `publish`.
    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|t| t.subscribers.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Table<M>>, InMemoryBusError> {
        self.table.lock().map_err(|_| InMemoryBusError::Poisoned)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            table: Mutex::new(Table {
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<usize, Self::Error> {
        let mut table = self.lock()?;
        let before = table.subscribers.len();

        let mut delivered = 0;
        table.subscribers.retain(|sub| {
            let alive = sub.tx.send(message.clone()).is_ok();
            delivered += usize::from(alive);
            alive
        });

        if delivered < before {
            tracing::debug!(dropped = before - delivered, "pruned disconnected subscribers");
        }
        Ok(delivered)
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        match self.lock() {
            Ok(mut table) => {
                let id = table.next_id;
                table.next_id += 1;
                table.subscribers.push(Subscriber { id, tx });
                tracing::debug!(subscriber = id, "subscribed to event bus");
            }
            // The sender is dropped here, so the subscription reads as disconnected.
            Err(_) => tracing::error!("event bus poisoned; subscription is closed"),
        }
        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_counts_live_subscribers() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(0u32).unwrap(), 0);

        let a = bus.subscribe();
        let b = bus.subscribe();
        assert_eq!(bus.publish(7u32).unwrap(), 2);

        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn dropped_subscribers_stop_counting() {
        let bus = InMemoryEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.publish(1u8).unwrap(), 1);
        assert_eq!(bus.publish(2u8).unwrap(), 1);

        assert_eq!(kept.try_recv().unwrap(), 1);
        assert_eq!(kept.try_recv().unwrap(), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn late_subscriber_sees_only_later_messages() {
        let bus = InMemoryEventBus::new();
        let early = bus.subscribe();
        bus.publish("first").unwrap();
        let late = bus.subscribe();
        bus.publish("second").unwrap();

        assert_eq!(early.try_recv().unwrap(), "first");
        assert_eq!(late.try_recv().unwrap(), "second");
        assert!(late.try_recv().is_err());
    }
}
