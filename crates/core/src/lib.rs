//! `atelier-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every store:
//! typed identifiers, money, the error taxonomy and the aggregate traits.
//! No infrastructure concerns live here.

pub mod aggregate;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use error::{DomainError, DomainResult, ValidationError};
pub use id::{AggregateId, CategoryId, CustomerId, ItemId, MoldId, NotificationId, SaleId};
pub use value_object::{Currency, Money, ValueObject};
