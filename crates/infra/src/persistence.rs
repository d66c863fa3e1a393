//! Persistence collaborator.
//!
//! The in-memory stores are the source of truth. Committed envelopes are
//! written to a [`RecordSink`] *after* the commit, with bounded retries.
//! Envelopes that still fail wait in an outbox and are retried on the next
//! flush; a failed write never unwinds the in-memory commit.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, mpsc};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use atelier_core::AggregateId;
use atelier_events::{EventBus, Subscription};

use crate::service::JsonEnvelope;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordSinkError {
    /// Temporary failure; the write may be retried.
    #[error("record sink unavailable: {0}")]
    Unavailable(String),

    /// The sink refused the record; retrying will not help.
    #[error("record rejected: {0}")]
    Rejected(String),
}

impl RecordSinkError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RecordSinkError::Unavailable(_))
    }
}

/// Durable destination for committed envelopes, one record per entity id.
///
/// Delivery is at-least-once: implementations must treat an envelope whose
/// `sequence_number` they already hold as a successful no-op.
pub trait RecordSink: Send + Sync {
    fn write(&self, envelope: &JsonEnvelope) -> Result<(), RecordSinkError>;
}

impl<S> RecordSink for Arc<S>
where
    S: RecordSink + ?Sized,
{
    fn write(&self, envelope: &JsonEnvelope) -> Result<(), RecordSinkError> {
        (**self).write(envelope)
    }
}

/// In-memory record sink.
///
/// Intended for tests/dev. `fail_next` injects transient failures.
#[derive(Debug, Default)]
pub struct InMemoryRecordSink {
    records: RwLock<HashMap<AggregateId, BTreeMap<u64, JsonEnvelope>>>,
    failures: AtomicU32,
}

impl InMemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Envelopes held for one record, in sequence order.
    pub fn history(&self, record_id: AggregateId) -> Vec<JsonEnvelope> {
        self.records
            .read()
            .map(|records| {
                records
                    .get(&record_id)
                    .map(|h| h.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Total envelopes held across all records.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .map(|records| records.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for InMemoryRecordSink {
    fn write(&self, envelope: &JsonEnvelope) -> Result<(), RecordSinkError> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(RecordSinkError::Unavailable("injected failure".to_string()));
        }

        let mut records = self
            .records
            .write()
            .map_err(|_| RecordSinkError::Unavailable("lock poisoned".to_string()))?;
        records
            .entry(envelope.record_id())
            .or_default()
            .entry(envelope.sequence_number())
            .or_insert_with(|| envelope.clone());
        Ok(())
    }
}

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every retry.
    Fixed,
    /// base * 2^(attempt - 1), capped at `max_delay`.
    #[default]
    Exponential,
}

/// Bounded retry policy for sink writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, first try included. `1` means no retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3, Duration::from_millis(50), Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            strategy: BackoffStrategy::Exponential,
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay
                    .checked_mul(factor)
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay)
            }
        }
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Writes envelopes to a sink, keeping the ones it could not write.
#[derive(Debug)]
pub struct PersistenceWriter<S> {
    sink: S,
    policy: RetryPolicy,
    outbox: VecDeque<JsonEnvelope>,
}

impl<S: RecordSink> PersistenceWriter<S> {
    pub fn new(sink: S, policy: RetryPolicy) -> Self {
        Self {
            sink,
            policy,
            outbox: VecDeque::new(),
        }
    }

    pub fn outbox_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Write one envelope. Returns `false` if it ended up in the outbox.
    ///
    /// Earlier envelopes still waiting in the outbox are retried first so a
    /// record's history reaches the sink in order.
    pub fn write(&mut self, envelope: JsonEnvelope) -> bool {
        self.flush();
        if !self.outbox.is_empty() {
            self.outbox.push_back(envelope);
            return false;
        }
        match self.write_with_retry(&envelope) {
            Ok(()) => true,
            Err(RecordSinkError::Rejected(reason)) => {
                error!(
                    sequence = envelope.sequence_number(),
                    event_type = envelope.event_type(),
                    reason = %reason,
                    "record sink rejected envelope; dropping it"
                );
                true
            }
            Err(err) => {
                error!(
                    sequence = envelope.sequence_number(),
                    error = %err,
                    "persistence gave up on envelope; kept in outbox"
                );
                self.outbox.push_back(envelope);
                false
            }
        }
    }

    /// Retry the outbox in order, stopping at the first envelope that still
    /// fails. Returns how many envelopes were written.
    pub fn flush(&mut self) -> usize {
        let mut written = 0;
        while let Some(envelope) = self.outbox.front() {
            match self.sink.write(envelope) {
                Ok(()) => {}
                Err(RecordSinkError::Rejected(reason)) => {
                    error!(
                        sequence = envelope.sequence_number(),
                        reason = %reason,
                        "record sink rejected queued envelope; dropping it"
                    );
                }
                Err(err) => {
                    debug!(pending = self.outbox.len(), error = %err, "outbox flush deferred");
                    break;
                }
            }
            self.outbox.pop_front();
            written += 1;
        }
        written
    }

    fn write_with_retry(&self, envelope: &JsonEnvelope) -> Result<(), RecordSinkError> {
        let mut attempt = 1;
        loop {
            match self.sink.write(envelope) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && self.policy.should_retry(attempt) => {
                    let delay = self.policy.delay_for_attempt(attempt);
                    warn!(
                        sequence = envelope.sequence_number(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "record sink write failed; retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<S> PersistenceWriter<S>
where
    S: RecordSink + 'static,
{
    /// Drain `bus` on a background thread until shut down.
    pub fn spawn<B>(self, bus: &B) -> std::io::Result<WorkerHandle<S>>
    where
        B: EventBus<JsonEnvelope>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let subscription = bus.subscribe();

        let join = thread::Builder::new()
            .name("atelier-persistence".to_string())
            .spawn(move || worker_loop(self, subscription, shutdown_rx))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

/// Handle to stop and join the persistence worker.
#[derive(Debug)]
pub struct WorkerHandle<S> {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<PersistenceWriter<S>>>,
}

impl<S> WorkerHandle<S> {
    /// Stop the worker after it drains what was already published, and
    /// return the writer (with any envelopes still in its outbox).
    pub fn shutdown(mut self) -> Option<PersistenceWriter<S>> {
        let _ = self.shutdown.send(());
        self.join.take().and_then(|j| j.join().ok())
    }
}

fn worker_loop<S: RecordSink>(
    mut writer: PersistenceWriter<S>,
    subscription: Subscription<JsonEnvelope>,
    shutdown_rx: mpsc::Receiver<()>,
) -> PersistenceWriter<S> {
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match subscription.recv_timeout(tick) {
            Ok(envelope) => {
                writer.write(envelope);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if writer.outbox_len() > 0 {
                    writer.flush();
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    while let Ok(envelope) = subscription.try_recv() {
        writer.write(envelope);
    }
    writer.flush();
    if writer.outbox_len() > 0 {
        warn!(pending = writer.outbox_len(), "persistence worker stopped with unwritten envelopes");
    }
    writer
}
