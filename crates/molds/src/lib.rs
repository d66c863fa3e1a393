//! Mold domain module: casting molds, their usage counters and the
//! item↔mold linkage.

pub mod mold;
pub mod store;

pub use mold::{
    ChangeStatus, ItemLinked, ItemUnlinked, LinkItem, Mold, MoldCommand, MoldEvent,
    MoldRegistered, MoldRemoved, MoldStatus, MoldUpdated, RecordUsage, RegisterMold, RemoveMold,
    ResetUsage, StatusChanged, UnlinkItem, UpdateMold, UsageRecorded, UsageReset,
};
pub use store::{MoldChanges, MoldStore, NewMold};
