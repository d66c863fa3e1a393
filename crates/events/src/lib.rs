//! Domain events and their distribution.
//!
//! Stores emit typed events when they commit; this crate wraps them into
//! envelopes and hands them to the collaborators that care (persistence,
//! realtime feeds) through an [`EventBus`].

pub mod bus;
pub mod changes;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use changes::ChangeSet;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
