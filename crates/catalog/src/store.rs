//! Catalog store: the single owner of item stock.

use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{
    Aggregate, CategoryId, DomainError, DomainResult, ItemId, Money, ValidationError,
};

use crate::category::{Category, CategoryTree};
use crate::item::{
    CreateItem, Item, ItemCommand, ItemEvent, RestoreStock, SetActive, SetStock, UpdateItem,
    WithdrawStock,
};

/// Input for `create_item`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub stock: i64,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub materials: Vec<String>,
}

fn default_active() -> bool {
    true
}

/// Replacement for an item's descriptive fields. Stock and the active flag
/// have their own commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub materials: Vec<String>,
}

/// A validated claim on stock, holding the unit price read at check time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub item_id: ItemId,
    pub quantity: i64,
    pub unit_price: Money,
}

/// Predicate for `find_active`. Defaults to active items only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFilter {
    /// `None` matches both active and inactive items.
    pub active: Option<bool>,
    pub category: Option<CategoryId>,
    /// Case-insensitive substring of name or description.
    pub text: Option<String>,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            active: Some(true),
            category: None,
            text: None,
        }
    }
}

/// Lazy, restartable view over the items matching an `ItemFilter`.
///
/// Cloning yields an independent cursor at the same position; `restart`
/// rewinds to the first item.
#[derive(Debug, Clone)]
pub struct ActiveItems<'a> {
    all: &'a BTreeMap<ItemId, Item>,
    cursor: btree_map::Values<'a, ItemId, Item>,
    active: Option<bool>,
    categories: Option<BTreeSet<CategoryId>>,
    needle: Option<String>,
}

impl<'a> ActiveItems<'a> {
    pub fn restart(&mut self) {
        self.cursor = self.all.values();
    }

    fn matches(&self, item: &Item) -> bool {
        if let Some(active) = self.active {
            if item.is_active() != active {
                return false;
            }
        }
        if let Some(categories) = &self.categories {
            match item.category_id() {
                Some(c) if categories.contains(&c) => {}
                _ => return false,
            }
        }
        if let Some(needle) = &self.needle {
            let hit = item.name().to_lowercase().contains(needle)
                || item.description().to_lowercase().contains(needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

impl<'a> Iterator for ActiveItems<'a> {
    type Item = &'a Item;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.cursor.next()?;
            if self.matches(item) {
                return Some(item);
            }
        }
    }
}

/// In-memory catalog: items plus the category tree.
///
/// Every mutation goes through the item aggregate (`handle` then `apply`).
/// Multi-item mutations decide all items first and apply only when every
/// decision succeeded, so a rejected batch leaves the store untouched.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    items: BTreeMap<ItemId, Item>,
    categories: CategoryTree,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn require(&self, id: ItemId) -> DomainResult<&Item> {
        self.items
            .get(&id)
            .ok_or_else(|| DomainError::not_found("item", id))
    }

    pub fn list(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn categories(&self) -> &CategoryTree {
        &self.categories
    }

    pub fn create_item(
        &mut self,
        id: ItemId,
        new: NewItem,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        if self.items.contains_key(&id) {
            return Err(DomainError::conflict(format!("item {id} already exists")));
        }
        self.ensure_category(new.category_id)?;

        let mut item = Item::empty(id);
        let events = item.handle(&ItemCommand::CreateItem(CreateItem {
            item_id: id,
            name: new.name,
            description: new.description,
            price: new.price,
            stock: new.stock,
            active: new.active,
            category_id: new.category_id,
            materials: new.materials,
            occurred_at: at,
        }))?;
        for ev in &events {
            item.apply(ev);
        }
        self.items.insert(id, item);
        Ok(events)
    }

    pub fn update_item(
        &mut self,
        id: ItemId,
        changes: ItemChanges,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        self.ensure_category(changes.category_id)?;
        self.execute(
            id,
            ItemCommand::UpdateItem(UpdateItem {
                item_id: id,
                name: changes.name,
                description: changes.description,
                price: changes.price,
                category_id: changes.category_id,
                materials: changes.materials,
                occurred_at: at,
            }),
        )
    }

    /// Direct stock edit. Fails with `NotFound` or `NegativeStock`.
    pub fn set_stock(
        &mut self,
        id: ItemId,
        stock: i64,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        self.execute(
            id,
            ItemCommand::SetStock(SetStock {
                item_id: id,
                stock,
                occurred_at: at,
            }),
        )
    }

    pub fn set_active(
        &mut self,
        id: ItemId,
        active: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        self.execute(
            id,
            ItemCommand::SetActive(SetActive {
                item_id: id,
                active,
                occurred_at: at,
            }),
        )
    }

    /// Check that `quantity` of `id` can be sold right now. Pure.
    pub fn reserve(&self, id: ItemId, quantity: i64) -> DomainResult<Reservation> {
        let item = self.require(id)?;
        item.check_sellable(quantity)?;
        Ok(Reservation {
            item_id: id,
            quantity,
            unit_price: item.price(),
        })
    }

    /// Withdraw stock for every reservation, all or nothing.
    ///
    /// Reservations for the same item are summed and re-checked against the
    /// current stock, so stale or duplicated reservations cannot oversell.
    pub fn commit_reservations(
        &mut self,
        reservations: &[Reservation],
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        let totals = sum_by_item(reservations.iter().map(|r| (r.item_id, r.quantity)))?;
        self.decide_then_apply(&totals, |item_id, quantity| {
            ItemCommand::WithdrawStock(WithdrawStock {
                item_id,
                quantity,
                occurred_at: at,
            })
        })
    }

    /// Put stock back (sale cancellation), all or nothing.
    pub fn restock(
        &mut self,
        lines: &[(ItemId, i64)],
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<ItemEvent>> {
        let totals = sum_by_item(lines.iter().copied())?;
        self.decide_then_apply(&totals, |item_id, quantity| {
            ItemCommand::RestoreStock(RestoreStock {
                item_id,
                quantity,
                occurred_at: at,
            })
        })
    }

    pub fn find_active(&self, filter: &ItemFilter) -> DomainResult<ActiveItems<'_>> {
        let categories: Option<BTreeSet<CategoryId>> = match filter.category {
            Some(root) => Some(self.categories.descendants_of(root)?.into_iter().collect()),
            None => None,
        };
        let needle = filter
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        Ok(ActiveItems {
            all: &self.items,
            cursor: self.items.values(),
            active: filter.active,
            categories,
            needle,
        })
    }

    /// Σ price × stock, optionally restricted to a category subtree.
    pub fn inventory_value(&self, category: Option<CategoryId>) -> DomainResult<Money> {
        let filter = ItemFilter {
            active: None,
            category,
            text: None,
        };
        self.find_active(&filter)?.try_fold(Money::ZERO, |acc, item| {
            let stock = u64::try_from(item.stock()).unwrap_or(0);
            item.price()
                .checked_mul(stock)
                .and_then(|v| acc.checked_add(v))
                .ok_or(DomainError::Validation(ValidationError::AmountOverflow))
        })
    }

    /// Items whose price was never filled in.
    pub fn zero_priced(&self) -> impl Iterator<Item = &Item> {
        self.items.values().filter(|i| i.price().is_zero())
    }

    pub fn add_category(
        &mut self,
        id: CategoryId,
        name: impl Into<String>,
        parent: Option<CategoryId>,
    ) -> DomainResult<Category> {
        self.categories.add(id, name, parent).cloned()
    }

    pub fn move_category(&mut self, id: CategoryId, parent: Option<CategoryId>) -> DomainResult<()> {
        self.categories.move_category(id, parent)
    }

    fn ensure_category(&self, category: Option<CategoryId>) -> DomainResult<()> {
        match category {
            Some(c) if !self.categories.contains(c) => Err(DomainError::not_found("category", c)),
            _ => Ok(()),
        }
    }

    fn execute(&mut self, id: ItemId, command: ItemCommand) -> DomainResult<Vec<ItemEvent>> {
        let item = self
            .items
            .get_mut(&id)
            .ok_or_else(|| DomainError::not_found("item", id))?;
        let events = item.handle(&command)?;
        for ev in &events {
            item.apply(ev);
        }
        Ok(events)
    }

    fn decide_then_apply<F>(
        &mut self,
        totals: &[(ItemId, i64)],
        command: F,
    ) -> DomainResult<Vec<ItemEvent>>
    where
        F: Fn(ItemId, i64) -> ItemCommand,
    {
        // Decide: no mutation until every item agreed.
        let mut decided = Vec::with_capacity(totals.len());
        for &(item_id, quantity) in totals {
            let item = self.require(item_id)?;
            decided.push((item_id, item.handle(&command(item_id, quantity))?));
        }

        // Evolve.
        let mut out = Vec::new();
        for (item_id, events) in decided {
            if let Some(item) = self.items.get_mut(&item_id) {
                for ev in &events {
                    item.apply(ev);
                }
            }
            out.extend(events);
        }
        Ok(out)
    }
}

/// Sum quantities per item, keeping first-appearance order.
fn sum_by_item(lines: impl Iterator<Item = (ItemId, i64)>) -> DomainResult<Vec<(ItemId, i64)>> {
    let mut totals: Vec<(ItemId, i64)> = Vec::new();
    for (item_id, quantity) in lines {
        if quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity { item_id, quantity }.into());
        }
        match totals.iter_mut().find(|(id, _)| *id == item_id) {
            Some((_, sum)) => {
                *sum = sum
                    .checked_add(quantity)
                    .ok_or_else(|| DomainError::validation("quantity overflow"))?;
            }
            None => totals.push((item_id, quantity)),
        }
    }
    Ok(totals)
}
