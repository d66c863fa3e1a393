use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{
    Aggregate, AggregateId, AggregateRoot, CategoryId, DomainError, ItemId, Money, ValidationError,
};
use atelier_events::Event;

/// Aggregate root: Item (a jewelry piece).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    id: ItemId,
    name: String,
    description: String,
    /// Price in smallest currency unit; `Money` cannot be negative.
    price: Money,
    stock: i64,
    active: bool,
    category_id: Option<CategoryId>,
    materials: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Item {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            price: Money::ZERO,
            stock: 0,
            active: false,
            category_id: None,
            materials: Vec::new(),
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    pub fn materials(&self) -> &[String] {
        &self.materials
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

}

impl AggregateRoot for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub active: bool,
    pub category_id: Option<CategoryId>,
    pub materials: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem (full replacement of the descriptive fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub item_id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    pub materials: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStock (direct edit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStock {
    pub item_id: ItemId,
    pub stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: WithdrawStock (sale commit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawStock {
    pub item_id: ItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RestoreStock (sale cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStock {
    pub item_id: ItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetActive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActive {
    pub item_id: ItemId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCommand {
    CreateItem(CreateItem),
    UpdateItem(UpdateItem),
    SetStock(SetStock),
    WithdrawStock(WithdrawStock),
    RestoreStock(RestoreStock),
    SetActive(SetActive),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock: i64,
    pub active: bool,
    pub category_id: Option<CategoryId>,
    pub materials: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub item_id: ItemId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    pub materials: Vec<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockSet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSet {
    pub item_id: ItemId,
    pub previous: i64,
    pub stock: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockWithdrawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockWithdrawn {
    pub item_id: ItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockRestored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRestored {
    pub item_id: ItemId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ActivationChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationChanged {
    pub item_id: ItemId,
    pub active: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    ItemCreated(ItemCreated),
    ItemUpdated(ItemUpdated),
    StockSet(StockSet),
    StockWithdrawn(StockWithdrawn),
    StockRestored(StockRestored),
    ActivationChanged(ActivationChanged),
}

impl ItemEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            ItemEvent::ItemCreated(e) => e.item_id,
            ItemEvent::ItemUpdated(e) => e.item_id,
            ItemEvent::StockSet(e) => e.item_id,
            ItemEvent::StockWithdrawn(e) => e.item_id,
            ItemEvent::StockRestored(e) => e.item_id,
            ItemEvent::ActivationChanged(e) => e.item_id,
        }
    }

    /// Whether this event can move the item across a stock threshold.
    pub fn touches_stock(&self) -> bool {
        matches!(
            self,
            ItemEvent::ItemCreated(_)
                | ItemEvent::StockSet(_)
                | ItemEvent::StockWithdrawn(_)
                | ItemEvent::StockRestored(_)
        )
    }
}

impl Event for ItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ItemEvent::ItemCreated(_) => "catalog.item.created",
            ItemEvent::ItemUpdated(_) => "catalog.item.updated",
            ItemEvent::StockSet(_) => "catalog.item.stock_set",
            ItemEvent::StockWithdrawn(_) => "catalog.item.stock_withdrawn",
            ItemEvent::StockRestored(_) => "catalog.item.stock_restored",
            ItemEvent::ActivationChanged(_) => "catalog.item.activation_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ItemEvent::ItemCreated(e) => e.occurred_at,
            ItemEvent::ItemUpdated(e) => e.occurred_at,
            ItemEvent::StockSet(e) => e.occurred_at,
            ItemEvent::StockWithdrawn(e) => e.occurred_at,
            ItemEvent::StockRestored(e) => e.occurred_at,
            ItemEvent::ActivationChanged(e) => e.occurred_at,
        }
    }

    fn record_id(&self) -> AggregateId {
        self.item_id().into()
    }
}

impl Aggregate for Item {
    type Command = ItemCommand;
    type Event = ItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ItemEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.stock = e.stock;
                self.active = e.active;
                self.category_id = e.category_id;
                self.materials = e.materials.clone();
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            ItemEvent::ItemUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.price = e.price;
                self.category_id = e.category_id;
                self.materials = e.materials.clone();
            }
            ItemEvent::StockSet(e) => {
                self.stock = e.stock;
            }
            ItemEvent::StockWithdrawn(e) => {
                self.stock -= e.quantity;
            }
            ItemEvent::StockRestored(e) => {
                self.stock += e.quantity;
            }
            ItemEvent::ActivationChanged(e) => {
                self.active = e.active;
            }
        }

        debug_assert!(self.stock >= 0, "item {} stock went negative", self.id);

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ItemCommand::CreateItem(cmd) => self.handle_create(cmd),
            ItemCommand::UpdateItem(cmd) => self.handle_update(cmd),
            ItemCommand::SetStock(cmd) => self.handle_set_stock(cmd),
            ItemCommand::WithdrawStock(cmd) => self.handle_withdraw(cmd),
            ItemCommand::RestoreStock(cmd) => self.handle_restore(cmd),
            ItemCommand::SetActive(cmd) => self.handle_set_active(cmd),
        }
    }
}

impl Item {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("item", self.id));
        }
        Ok(())
    }

    fn ensure_item_id(&self, item_id: ItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<ItemEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.stock < 0 {
            return Err(DomainError::NegativeStock {
                item_id: cmd.item_id,
                attempted: cmd.stock,
            });
        }
        Ok(vec![ItemEvent::ItemCreated(ItemCreated {
            item_id: cmd.item_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            price: cmd.price,
            stock: cmd.stock,
            active: cmd.active,
            category_id: cmd.category_id,
            materials: cmd.materials.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItem) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![ItemEvent::ItemUpdated(ItemUpdated {
            item_id: cmd.item_id,
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            price: cmd.price,
            category_id: cmd.category_id,
            materials: cmd.materials.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_stock(&self, cmd: &SetStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.stock < 0 {
            return Err(DomainError::NegativeStock {
                item_id: cmd.item_id,
                attempted: cmd.stock,
            });
        }
        if cmd.stock == self.stock {
            return Ok(vec![]);
        }

        Ok(vec![ItemEvent::StockSet(StockSet {
            item_id: cmd.item_id,
            previous: self.stock,
            stock: cmd.stock,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_withdraw(&self, cmd: &WithdrawStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;
        self.check_sellable(cmd.quantity)?;

        Ok(vec![ItemEvent::StockWithdrawn(StockWithdrawn {
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restore(&self, cmd: &RestoreStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity {
                item_id: cmd.item_id,
                quantity: cmd.quantity,
            }
            .into());
        }
        if self.stock.checked_add(cmd.quantity).is_none() {
            return Err(DomainError::validation("stock overflow"));
        }

        Ok(vec![ItemEvent::StockRestored(StockRestored {
            item_id: cmd.item_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_active(&self, cmd: &SetActive) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_item_id(cmd.item_id)?;

        if cmd.active == self.active {
            return Ok(vec![]);
        }

        Ok(vec![ItemEvent::ActivationChanged(ActivationChanged {
            item_id: cmd.item_id,
            active: cmd.active,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Sale-time checks: active, positive quantity, enough stock.
    pub fn check_sellable(&self, quantity: i64) -> Result<(), DomainError> {
        self.ensure_created()?;
        if quantity <= 0 {
            return Err(ValidationError::NonPositiveQuantity {
                item_id: self.id,
                quantity,
            }
            .into());
        }
        if !self.active {
            return Err(ValidationError::InactiveItem { item_id: self.id }.into());
        }
        if quantity > self.stock {
            return Err(ValidationError::InsufficientStock {
                item_id: self.id,
                requested: quantity,
                available: self.stock,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn created_item(stock: i64) -> Item {
        let item_id = ItemId::new();
        let mut item = Item::empty(item_id);
        execute(
            &mut item,
            &ItemCommand::CreateItem(CreateItem {
                item_id,
                name: "Anillo de Diamante".to_string(),
                description: "18k gold ring".to_string(),
                price: Money::from_minor(150_000),
                stock,
                active: true,
                category_id: None,
                materials: vec!["oro".to_string(), "diamante".to_string()],
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        item
    }

    fn withdraw(item: &Item, quantity: i64) -> ItemCommand {
        ItemCommand::WithdrawStock(WithdrawStock {
            item_id: item.id_typed(),
            quantity,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn create_item_emits_item_created_event() {
        let item = created_item(3);
        assert_eq!(item.stock(), 3);
        assert!(item.is_active());
        assert_eq!(item.version(), 1);
        assert_eq!(item.name(), "Anillo de Diamante");
    }

    #[test]
    fn create_rejects_blank_name_and_negative_stock() {
        let item_id = ItemId::new();
        let item = Item::empty(item_id);
        let mut cmd = CreateItem {
            item_id,
            name: "  ".to_string(),
            description: String::new(),
            price: Money::ZERO,
            stock: 1,
            active: true,
            category_id: None,
            materials: vec![],
            occurred_at: test_time(),
        };
        assert!(matches!(
            item.handle(&ItemCommand::CreateItem(cmd.clone())),
            Err(DomainError::Validation(_))
        ));

        cmd.name = "Collar".to_string();
        cmd.stock = -1;
        assert!(matches!(
            item.handle(&ItemCommand::CreateItem(cmd)),
            Err(DomainError::NegativeStock { attempted: -1, .. })
        ));
    }

    #[test]
    fn withdraw_more_than_stock_is_insufficient_stock() {
        let item = created_item(1);
        let err = item.handle(&withdraw(&item, 5)).unwrap_err();
        assert_eq!(
            err,
            DomainError::Validation(ValidationError::InsufficientStock {
                item_id: item.id_typed(),
                requested: 5,
                available: 1,
            })
        );
    }

    #[test]
    fn withdraw_from_inactive_item_is_rejected() {
        let mut item = created_item(4);
        let item_id = item.id_typed();
        execute(
            &mut item,
            &ItemCommand::SetActive(SetActive {
                item_id,
                active: false,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = item.handle(&withdraw(&item, 1)).unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation(ValidationError::InactiveItem { .. })
        ));
    }

    #[test]
    fn set_stock_rejects_negative_and_skips_unchanged() {
        let item = created_item(2);
        let negative = ItemCommand::SetStock(SetStock {
            item_id: item.id_typed(),
            stock: -3,
            occurred_at: test_time(),
        });
        assert!(matches!(
            item.handle(&negative),
            Err(DomainError::NegativeStock { attempted: -3, .. })
        ));

        let same = ItemCommand::SetStock(SetStock {
            item_id: item.id_typed(),
            stock: 2,
            occurred_at: test_time(),
        });
        assert!(item.handle(&same).unwrap().is_empty());
    }

    #[test]
    fn commands_on_uncreated_item_are_not_found() {
        let item = Item::empty(ItemId::new());
        assert!(matches!(
            item.handle(&withdraw(&item, 1)),
            Err(DomainError::NotFound { entity: "item", .. })
        ));
    }

    #[test]
    fn restore_adds_back_stock() {
        let mut item = created_item(1);
        let item_id = item.id_typed();
        execute(
            &mut item,
            &ItemCommand::RestoreStock(RestoreStock {
                item_id,
                quantity: 2,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.stock(), 3);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let item = created_item(3);
        let before = item.clone();
        let _ = item.handle(&withdraw(&item, 2)).unwrap();
        let _ = item.handle(&withdraw(&item, 9));
        assert_eq!(item, before);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                ..ProptestConfig::default()
            })]

            /// Property: whatever withdrawals and edits are attempted, stock never goes negative.
            #[test]
            fn stock_never_negative(
                initial in 0i64..50,
                ops in proptest::collection::vec((any::<bool>(), -10i64..30), 0..40)
            ) {
                let mut item = created_item(initial);
                for (is_withdraw, n) in ops {
                    let cmd = if is_withdraw {
                        withdraw(&item, n)
                    } else {
                        ItemCommand::SetStock(SetStock {
                            item_id: item.id_typed(),
                            stock: n,
                            occurred_at: test_time(),
                        })
                    };
                    let _ = execute(&mut item, &cmd);
                    prop_assert!(item.stock() >= 0);
                }
            }
        }
    }
}
