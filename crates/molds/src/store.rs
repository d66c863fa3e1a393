//! Mold store: molds, code uniqueness, and the item→molds reverse index.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Aggregate, DomainError, DomainResult, ItemId, MoldId};

use crate::mold::{
    ChangeStatus, LinkItem, Mold, MoldCommand, MoldEvent, MoldStatus, RecordUsage, RegisterMold,
    RemoveMold, ResetUsage, UnlinkItem, UpdateMold,
};

/// Input for `register_mold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMold {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default = "default_status")]
    pub status: MoldStatus,
}

fn default_status() -> MoldStatus {
    MoldStatus::Stored
}

/// Input for `update_mold`. The code, status, counter and links each have
/// their own command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldChanges {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
}

/// In-memory mold store.
///
/// The forward set lives on each `Mold`; `by_item` is its exact inverse and
/// is maintained from the same applied events, so `molds_for_item` and
/// `Mold::items` can never disagree.
#[derive(Debug, Clone, Default)]
pub struct MoldStore {
    molds: BTreeMap<MoldId, Mold>,
    by_code: HashMap<String, MoldId>,
    by_item: BTreeMap<ItemId, BTreeSet<MoldId>>,
}

impl MoldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MoldId) -> Option<&Mold> {
        self.molds.get(&id)
    }

    pub fn require(&self, id: MoldId) -> DomainResult<&Mold> {
        self.molds
            .get(&id)
            .ok_or_else(|| DomainError::not_found("mold", id))
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Mold> {
        self.by_code
            .get(code.trim())
            .and_then(|id| self.molds.get(id))
    }

    pub fn list(&self) -> impl Iterator<Item = &Mold> {
        self.molds.values()
    }

    pub fn len(&self) -> usize {
        self.molds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.molds.is_empty()
    }

    pub fn molds_for_item(&self, item_id: ItemId) -> impl Iterator<Item = &Mold> {
        self.by_item
            .get(&item_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.molds.get(id))
    }

    /// Register a new mold. The code must be unique.
    pub fn register_mold(
        &mut self,
        id: MoldId,
        new: NewMold,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<MoldEvent>> {
        if self.molds.contains_key(&id) {
            return Err(DomainError::conflict(format!("mold {id} already exists")));
        }
        let code = new.code.trim().to_string();
        if self.by_code.contains_key(&code) {
            return Err(DomainError::conflict(format!("mold code {code} is already in use")));
        }

        let mut mold = Mold::empty(id);
        let events = mold.handle(&MoldCommand::RegisterMold(RegisterMold {
            mold_id: id,
            code: code.clone(),
            name: new.name,
            description: new.description,
            location: new.location,
            material: new.material,
            status: new.status,
            occurred_at: at,
        }))?;
        for ev in &events {
            mold.apply(ev);
        }
        self.by_code.insert(code, id);
        self.molds.insert(id, mold);
        Ok(events)
    }

    pub fn update_mold(
        &mut self,
        id: MoldId,
        changes: MoldChanges,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::UpdateMold(UpdateMold {
                mold_id: id,
                name: changes.name,
                description: changes.description,
                location: changes.location,
                material: changes.material,
                occurred_at: at,
            }),
        )
    }

    /// Drop a mold together with its code and every link it held.
    pub fn remove_mold(&mut self, id: MoldId, at: DateTime<Utc>) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::RemoveMold(RemoveMold {
                mold_id: id,
                occurred_at: at,
            }),
        )
    }

    pub fn record_usage(&mut self, id: MoldId, at: DateTime<Utc>) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::RecordUsage(RecordUsage {
                mold_id: id,
                occurred_at: at,
            }),
        )
    }

    /// The one explicit way the usage counter goes down.
    pub fn reset_usage(&mut self, id: MoldId, at: DateTime<Utc>) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::ResetUsage(ResetUsage {
                mold_id: id,
                occurred_at: at,
            }),
        )
    }

    /// Link an item. Callers check that the item exists.
    pub fn link_item(
        &mut self,
        id: MoldId,
        item_id: ItemId,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::LinkItem(LinkItem {
                mold_id: id,
                item_id,
                occurred_at: at,
            }),
        )
    }

    pub fn unlink_item(
        &mut self,
        id: MoldId,
        item_id: ItemId,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::UnlinkItem(UnlinkItem {
                mold_id: id,
                item_id,
                occurred_at: at,
            }),
        )
    }

    pub fn change_status(
        &mut self,
        id: MoldId,
        status: MoldStatus,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<MoldEvent>> {
        self.execute(
            id,
            MoldCommand::ChangeStatus(ChangeStatus {
                mold_id: id,
                status,
                note,
                occurred_at: at,
            }),
        )
    }

    fn execute(&mut self, id: MoldId, command: MoldCommand) -> DomainResult<Vec<MoldEvent>> {
        let mold = self
            .molds
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("mold", id))?;
        let events = mold.handle(&command)?;
        for ev in &events {
            mold.apply(ev);
        }
        for ev in &events {
            self.sync_indexes(ev);
        }
        Ok(events)
    }

    fn sync_indexes(&mut self, event: &MoldEvent) {
        match event {
            MoldEvent::ItemLinked(e) => {
                self.by_item.entry(e.item_id).or_default().insert(e.mold_id);
            }
            MoldEvent::ItemUnlinked(e) => self.unindex_link(e.item_id, e.mold_id),
            MoldEvent::MoldRemoved(e) => {
                for item_id in &e.items {
                    self.unindex_link(*item_id, e.mold_id);
                }
                self.by_code.remove(&e.code);
                self.molds.remove(&e.mold_id);
            }
            _ => {}
        }
    }

    fn unindex_link(&mut self, item_id: ItemId, mold_id: MoldId) {
        if let Some(set) = self.by_item.get_mut(&item_id) {
            set.remove(&mold_id);
            if set.is_empty() {
                self.by_item.remove(&item_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn new_mold(code: &str) -> NewMold {
        NewMold {
            code: code.to_string(),
            name: format!("Molde {code}"),
            description: String::new(),
            location: None,
            material: None,
            status: MoldStatus::Stored,
        }
    }

    fn ids<'a>(molds: impl Iterator<Item = &'a Mold>) -> Vec<MoldId> {
        molds.map(|m| m.id_typed()).collect()
    }

    #[test]
    fn duplicate_code_is_conflict() {
        let mut store = MoldStore::new();
        store.register_mold(MoldId::new(), new_mold("M-1"), now()).unwrap();

        let err = store
            .register_mold(MoldId::new(), new_mold(" M-1 "), now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(store.len(), 1);
        assert!(store.find_by_code("M-1").is_some());
    }

    #[test]
    fn linkage_is_symmetric() {
        let mut store = MoldStore::new();
        let a = MoldId::new();
        let b = MoldId::new();
        store.register_mold(a, new_mold("A"), now()).unwrap();
        store.register_mold(b, new_mold("B"), now()).unwrap();
        let item = ItemId::new();

        store.link_item(a, item, now()).unwrap();
        store.link_item(b, item, now()).unwrap();
        store.link_item(a, item, now()).unwrap();

        let mut linked = ids(store.molds_for_item(item));
        linked.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(linked, expected);
        assert_eq!(store.get(a).unwrap().items().len(), 1);

        store.unlink_item(a, item, now()).unwrap();
        assert_eq!(ids(store.molds_for_item(item)), vec![b]);
        assert!(!store.get(a).unwrap().is_linked(item));
    }

    #[test]
    fn unlink_missing_pair_is_noop_but_unknown_mold_is_not_found() {
        let mut store = MoldStore::new();
        let a = MoldId::new();
        store.register_mold(a, new_mold("A"), now()).unwrap();

        assert!(store.unlink_item(a, ItemId::new(), now()).unwrap().is_empty());
        assert!(matches!(
            store.unlink_item(MoldId::new(), ItemId::new(), now()),
            Err(DomainError::NotFound { entity: "mold", .. })
        ));
    }

    #[test]
    fn reset_usage_zeroes_counter() {
        let mut store = MoldStore::new();
        let a = MoldId::new();
        store.register_mold(a, new_mold("A"), now()).unwrap();
        store.record_usage(a, now()).unwrap();
        store.record_usage(a, now()).unwrap();
        assert_eq!(store.get(a).unwrap().usage_count(), 2);

        store.reset_usage(a, now()).unwrap();
        assert_eq!(store.get(a).unwrap().usage_count(), 0);
        assert!(store.reset_usage(a, now()).unwrap().is_empty());
    }

    #[test]
    fn update_keeps_code_and_links() {
        let mut store = MoldStore::new();
        let a = MoldId::new();
        let item = ItemId::new();
        store.register_mold(a, new_mold("A"), now()).unwrap();
        store.link_item(a, item, now()).unwrap();

        let events = store
            .update_mold(
                a,
                MoldChanges {
                    name: "Molde broche".to_string(),
                    description: "revisado".to_string(),
                    location: Some("Cajón 3".to_string()),
                    material: Some("caucho".to_string()),
                },
                now(),
            )
            .unwrap();

        assert_eq!(events.len(), 1);
        let mold = store.get(a).unwrap();
        assert_eq!(mold.name(), "Molde broche");
        assert_eq!(mold.material(), Some("caucho"));
        assert_eq!(mold.code(), "A");
        assert!(mold.is_linked(item));
        assert_eq!(store.find_by_code("A").map(Mold::id_typed), Some(a));
    }

    #[test]
    fn removal_clears_code_and_reverse_index() {
        let mut store = MoldStore::new();
        let a = MoldId::new();
        let b = MoldId::new();
        let item = ItemId::new();
        store.register_mold(a, new_mold("A"), now()).unwrap();
        store.register_mold(b, new_mold("B"), now()).unwrap();
        store.link_item(a, item, now()).unwrap();
        store.link_item(b, item, now()).unwrap();

        store.remove_mold(a, now()).unwrap();

        assert!(store.get(a).is_none());
        assert!(store.find_by_code("A").is_none());
        assert_eq!(ids(store.molds_for_item(item)), vec![b]);
        assert!(matches!(
            store.remove_mold(a, now()),
            Err(DomainError::NotFound { entity: "mold", .. })
        ));

        // The code is free again.
        store.register_mold(MoldId::new(), new_mold("A"), now()).unwrap();
        store.remove_mold(b, now()).unwrap();
        assert_eq!(store.molds_for_item(item).count(), 0);
        assert!(store.by_item.is_empty());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: after any sequence of link/unlink calls, the reverse
            /// index matches the forward sets exactly.
            #[test]
            fn reverse_index_matches_forward_sets(
                ops in proptest::collection::vec((any::<bool>(), 0usize..3, 0usize..4), 0..60)
            ) {
                let mut store = MoldStore::new();
                let molds: Vec<MoldId> = (0..3).map(|_| MoldId::new()).collect();
                let items: Vec<ItemId> = (0..4).map(|_| ItemId::new()).collect();
                for (i, m) in molds.iter().enumerate() {
                    store.register_mold(*m, new_mold(&format!("M{i}")), now()).unwrap();
                }

                for (link, m, i) in ops {
                    if link {
                        store.link_item(molds[m], items[i], now()).unwrap();
                    } else {
                        store.unlink_item(molds[m], items[i], now()).unwrap();
                    }
                }

                for item in &items {
                    for mold in store.list() {
                        let reverse = store.molds_for_item(*item).any(|m| m.id_typed() == mold.id_typed());
                        prop_assert_eq!(mold.is_linked(*item), reverse);
                    }
                }
            }
        }
    }
}
