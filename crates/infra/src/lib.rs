//! Infrastructure layer: the single-writer service over the in-memory stores,
//! configuration, and the persistence collaborator.

pub mod config;
pub mod persistence;
pub mod service;

pub use config::{AtelierConfig, ConfigError, PersistenceConfig};
pub use persistence::{
    BackoffStrategy, InMemoryRecordSink, PersistenceWriter, RecordSink, RecordSinkError,
    RetryPolicy, WorkerHandle,
};
pub use service::{CoreService, ItemView, JsonEnvelope};
