//! Sales domain module.
//!
//! Business rules for sales, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage). The `SalesEngine` is the only place that
//! mutates more than one store in a single command.

pub mod engine;
pub mod ledger;
pub mod sale;

pub use engine::{SaleLineRequest, SaleOutcome, SaleRequest, SalesEngine};
pub use ledger::{SaleLedger, SaleQuery};
pub use sale::{
    ChangeSaleStatus, PlaceSale, Sale, SaleChannel, SaleCommand, SaleEvent, SaleLine, SalePlaced,
    SaleStatus, SaleStatusChanged,
};
