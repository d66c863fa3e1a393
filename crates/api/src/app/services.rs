use std::{convert::Infallible, sync::Arc, thread, time::Duration};

use anyhow::Context;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use atelier_core::Currency;
use atelier_events::{EventBus, InMemoryEventBus};
use atelier_infra::{
    AtelierConfig, CoreService, InMemoryRecordSink, JsonEnvelope, PersistenceWriter, WorkerHandle,
};

pub type Bus = Arc<InMemoryEventBus<JsonEnvelope>>;
pub type Core = CoreService<Bus>;

/// Committed change pushed to SSE clients.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMessage {
    pub topic: String,
    pub record_type: String,
    pub record_id: String,
    pub sequence: u64,
    pub payload: serde_json::Value,
}

impl From<JsonEnvelope> for RealtimeMessage {
    fn from(env: JsonEnvelope) -> Self {
        Self {
            topic: env.event_type().to_string(),
            record_type: env.record_type().to_string(),
            record_id: env.record_id().to_string(),
            sequence: env.sequence_number(),
            payload: env.into_payload(),
        }
    }
}

const WELCOME_TITLE: &str = "Bienvenido";
const WELCOME_MESSAGE: &str = "Bienvenido al sistema de gestión de joyería";

pub struct AppServices {
    core: Core,
    currency: Currency,
    sink: Arc<InMemoryRecordSink>,
    persistence: std::sync::Mutex<Option<WorkerHandle<Arc<InMemoryRecordSink>>>>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }

    pub fn persisted_records(&self) -> usize {
        self.sink.len()
    }

    /// Stop the persistence worker after it drains pending envelopes.
    pub fn shutdown(&self) {
        let handle = self.persistence.lock().ok().and_then(|mut h| h.take());
        if let Some(writer) = handle.and_then(WorkerHandle::shutdown) {
            match writer.outbox_len() {
                0 => tracing::info!("persistence worker stopped"),
                unwritten => tracing::warn!(unwritten, "persistence worker stopped with unwritten envelopes"),
            }
        }
    }
}

pub fn build_services(config: &AtelierConfig) -> anyhow::Result<AppServices> {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let core = CoreService::from_config(config, bus.clone());

    let sink = Arc::new(InMemoryRecordSink::new());
    let persistence = PersistenceWriter::new(sink.clone(), config.retry_policy())
        .spawn(&bus)
        .context("failed to spawn persistence worker")?;

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> SSE clients. Ends when the bus is dropped.
    {
        let sub = bus.subscribe();
        let realtime_tx = realtime_tx.clone();
        thread::Builder::new()
            .name("atelier-realtime".to_string())
            .spawn(move || {
                while let Ok(env) = sub.recv() {
                    // Lossy: no receivers is fine.
                    let _ = realtime_tx.send(RealtimeMessage::from(env));
                }
            })
            .context("failed to spawn realtime bridge")?;
    }

    core.notify_system(WELCOME_TITLE, WELCOME_MESSAGE)
        .context("failed to post the welcome notification")?;

    Ok(AppServices {
        core,
        currency: config.currency.clone(),
        sink,
        persistence: std::sync::Mutex::new(Some(persistence)),
        realtime_tx,
    })
}

pub fn realtime_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        // Lagged receivers skip what they missed.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_catalog::NewItem;
    use atelier_core::Money;

    #[test]
    fn shutdown_drains_committed_changes_into_the_sink() {
        let services = build_services(&AtelierConfig::default()).unwrap();
        let mut realtime = services.realtime_tx().subscribe();
        assert_eq!(services.core().last_sequence().unwrap(), 1);
        assert_eq!(services.core().unread_notifications().unwrap(), 1);

        services
            .core()
            .create_item(NewItem {
                name: "Anillo".to_string(),
                description: String::new(),
                price: Money::from_minor(1_000),
                stock: 2,
                active: true,
                category_id: None,
                materials: Vec::new(),
            })
            .unwrap();
        let committed = services.core().last_sequence().unwrap();

        services.shutdown();
        assert_eq!(services.persisted_records() as u64, committed);

        // The bridge may still be forwarding the greeting; skip to the item.
        let item = loop {
            match realtime.try_recv() {
                Ok(msg) if msg.record_type == "catalog.item" => break msg,
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(e) => panic!("realtime bridge failed: {e}"),
            }
        };
        assert_eq!(item.sequence, 2);
    }
}
