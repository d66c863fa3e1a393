//! Customer domain module: contact data and purchase rollups.

pub mod customer;
pub mod store;

pub use customer::{
    ContactDetails, ContactUpdated, Customer, CustomerCommand, CustomerEvent, CustomerRegistered,
    CustomerRemoved, PurchaseRecorded, RecordPurchase, RegisterCustomer, RemoveCustomer,
    UpdateContact,
};
pub use store::{CustomerStore, NewCustomer};
