//! Catalog domain module: jewelry items, their stock, and the category tree.
//!
//! Pure domain logic (no IO, no locks). The store is handed to the sales
//! engine by `&mut` reference for the duration of one command.

pub mod category;
pub mod item;
pub mod store;

pub use category::{Category, CategoryTree};
pub use item::{
    ActivationChanged, CreateItem, Item, ItemCommand, ItemCreated, ItemEvent, ItemUpdated,
    RestoreStock, SetActive, SetStock, StockRestored, StockSet, StockWithdrawn, UpdateItem,
    WithdrawStock,
};
pub use store::{ActiveItems, CatalogStore, ItemChanges, ItemFilter, NewItem, Reservation};
