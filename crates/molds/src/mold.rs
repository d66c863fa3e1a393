use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ItemId, MoldId};
use atelier_events::Event;

/// Lifecycle status of a mold. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoldStatus {
    Stored,
    InUse,
    Maintenance,
    Loaned,
    Rented,
    Cleaning,
    UnderReview,
    Missing,
    Retired,
}

impl MoldStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MoldStatus::Stored => "stored",
            MoldStatus::InUse => "in_use",
            MoldStatus::Maintenance => "maintenance",
            MoldStatus::Loaned => "loaned",
            MoldStatus::Rented => "rented",
            MoldStatus::Cleaning => "cleaning",
            MoldStatus::UnderReview => "under_review",
            MoldStatus::Missing => "missing",
            MoldStatus::Retired => "retired",
        }
    }
}

impl fmt::Display for MoldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Mold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mold {
    id: MoldId,
    code: String,
    name: String,
    description: String,
    location: Option<String>,
    material: Option<String>,
    status: MoldStatus,
    usage_count: u64,
    last_used_at: Option<DateTime<Utc>>,
    /// Free-text log; one line is appended per status change.
    notes: String,
    items: BTreeSet<ItemId>,
    created_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Mold {
    pub fn empty(id: MoldId) -> Self {
        Self {
            id,
            code: String::new(),
            name: String::new(),
            description: String::new(),
            location: None,
            material: None,
            status: MoldStatus::Stored,
            usage_count: 0,
            last_used_at: None,
            notes: String::new(),
            items: BTreeSet::new(),
            created_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> MoldId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }

    pub fn status(&self) -> MoldStatus {
        self.status
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn items(&self) -> &BTreeSet<ItemId> {
        &self.items
    }

    pub fn is_linked(&self, item_id: ItemId) -> bool {
        self.items.contains(&item_id)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

}

impl AggregateRoot for Mold {
    type Id = MoldId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterMold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMold {
    pub mold_id: MoldId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub material: Option<String>,
    pub status: MoldStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateMold. Replaces the descriptive fields; the code stays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateMold {
    pub mold_id: MoldId,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub material: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveMold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveMold {
    pub mold_id: MoldId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordUsage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUsage {
    pub mold_id: MoldId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResetUsage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetUsage {
    pub mold_id: MoldId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: LinkItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
    pub mold_id: MoldId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UnlinkItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkItem {
    pub mold_id: MoldId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStatus {
    pub mold_id: MoldId,
    pub status: MoldStatus,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoldCommand {
    RegisterMold(RegisterMold),
    UpdateMold(UpdateMold),
    RemoveMold(RemoveMold),
    RecordUsage(RecordUsage),
    ResetUsage(ResetUsage),
    LinkItem(LinkItem),
    UnlinkItem(UnlinkItem),
    ChangeStatus(ChangeStatus),
}

/// Event: MoldRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldRegistered {
    pub mold_id: MoldId,
    pub code: String,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub material: Option<String>,
    pub status: MoldStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MoldUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldUpdated {
    pub mold_id: MoldId,
    pub name: String,
    pub description: String,
    pub location: Option<String>,
    pub material: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: MoldRemoved. Carries the links it drops so readers of the
/// record stream can unwind the item side too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoldRemoved {
    pub mold_id: MoldId,
    pub code: String,
    pub items: Vec<ItemId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UsageRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecorded {
    pub mold_id: MoldId,
    /// Counter value after this use.
    pub usage_count: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: UsageReset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReset {
    pub mold_id: MoldId,
    pub previous: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemLinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLinked {
    pub mold_id: MoldId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUnlinked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUnlinked {
    pub mold_id: MoldId,
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub mold_id: MoldId,
    pub from: MoldStatus,
    pub to: MoldStatus,
    /// Line appended to the mold's notes.
    pub note_line: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoldEvent {
    MoldRegistered(MoldRegistered),
    MoldUpdated(MoldUpdated),
    MoldRemoved(MoldRemoved),
    UsageRecorded(UsageRecorded),
    UsageReset(UsageReset),
    ItemLinked(ItemLinked),
    ItemUnlinked(ItemUnlinked),
    StatusChanged(StatusChanged),
}

impl MoldEvent {
    pub fn mold_id(&self) -> MoldId {
        match self {
            MoldEvent::MoldRegistered(e) => e.mold_id,
            MoldEvent::MoldUpdated(e) => e.mold_id,
            MoldEvent::MoldRemoved(e) => e.mold_id,
            MoldEvent::UsageRecorded(e) => e.mold_id,
            MoldEvent::UsageReset(e) => e.mold_id,
            MoldEvent::ItemLinked(e) => e.mold_id,
            MoldEvent::ItemUnlinked(e) => e.mold_id,
            MoldEvent::StatusChanged(e) => e.mold_id,
        }
    }
}

impl Event for MoldEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MoldEvent::MoldRegistered(_) => "molds.mold.registered",
            MoldEvent::MoldUpdated(_) => "molds.mold.updated",
            MoldEvent::MoldRemoved(_) => "molds.mold.removed",
            MoldEvent::UsageRecorded(_) => "molds.mold.usage_recorded",
            MoldEvent::UsageReset(_) => "molds.mold.usage_reset",
            MoldEvent::ItemLinked(_) => "molds.mold.item_linked",
            MoldEvent::ItemUnlinked(_) => "molds.mold.item_unlinked",
            MoldEvent::StatusChanged(_) => "molds.mold.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            MoldEvent::MoldRegistered(e) => e.occurred_at,
            MoldEvent::MoldUpdated(e) => e.occurred_at,
            MoldEvent::MoldRemoved(e) => e.occurred_at,
            MoldEvent::UsageRecorded(e) => e.occurred_at,
            MoldEvent::UsageReset(e) => e.occurred_at,
            MoldEvent::ItemLinked(e) => e.occurred_at,
            MoldEvent::ItemUnlinked(e) => e.occurred_at,
            MoldEvent::StatusChanged(e) => e.occurred_at,
        }
    }

    fn record_id(&self) -> AggregateId {
        self.mold_id().into()
    }
}

impl Aggregate for Mold {
    type Command = MoldCommand;
    type Event = MoldEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            MoldEvent::MoldRegistered(e) => {
                self.id = e.mold_id;
                self.code = e.code.clone();
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.location = e.location.clone();
                self.material = e.material.clone();
                self.status = e.status;
                self.created_at = Some(e.occurred_at);
                self.created = true;
            }
            MoldEvent::MoldUpdated(e) => {
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.location = e.location.clone();
                self.material = e.material.clone();
            }
            MoldEvent::MoldRemoved(_) => {
                self.items.clear();
                self.created = false;
            }
            MoldEvent::UsageRecorded(e) => {
                self.usage_count = e.usage_count;
                self.last_used_at = Some(e.occurred_at);
            }
            MoldEvent::UsageReset(_) => {
                self.usage_count = 0;
            }
            MoldEvent::ItemLinked(e) => {
                self.items.insert(e.item_id);
            }
            MoldEvent::ItemUnlinked(e) => {
                self.items.remove(&e.item_id);
            }
            MoldEvent::StatusChanged(e) => {
                self.status = e.to;
                if !self.notes.is_empty() {
                    self.notes.push('\n');
                }
                self.notes.push_str(&e.note_line);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            MoldCommand::RegisterMold(cmd) => self.handle_register(cmd),
            MoldCommand::UpdateMold(cmd) => self.handle_update(cmd),
            MoldCommand::RemoveMold(cmd) => self.handle_remove(cmd),
            MoldCommand::RecordUsage(cmd) => self.handle_record_usage(cmd),
            MoldCommand::ResetUsage(cmd) => self.handle_reset_usage(cmd),
            MoldCommand::LinkItem(cmd) => self.handle_link(cmd),
            MoldCommand::UnlinkItem(cmd) => self.handle_unlink(cmd),
            MoldCommand::ChangeStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl Mold {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("mold", self.id));
        }
        Ok(())
    }

    fn ensure_mold_id(&self, mold_id: MoldId) -> Result<(), DomainError> {
        if self.id != mold_id {
            return Err(DomainError::invariant("mold_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterMold) -> Result<Vec<MoldEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("mold already exists"));
        }
        if cmd.code.trim().is_empty() {
            return Err(DomainError::validation("mold code cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("mold name cannot be empty"));
        }

        Ok(vec![MoldEvent::MoldRegistered(MoldRegistered {
            mold_id: cmd.mold_id,
            code: cmd.code.trim().to_string(),
            name: cmd.name.trim().to_string(),
            description: cmd.description.clone(),
            location: cmd.location.clone(),
            material: cmd.material.clone(),
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateMold) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("mold name cannot be empty"));
        }
        if name == self.name
            && cmd.description == self.description
            && cmd.location == self.location
            && cmd.material == self.material
        {
            return Ok(vec![]);
        }

        Ok(vec![MoldEvent::MoldUpdated(MoldUpdated {
            mold_id: cmd.mold_id,
            name: name.to_string(),
            description: cmd.description.clone(),
            location: cmd.location.clone(),
            material: cmd.material.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveMold) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        Ok(vec![MoldEvent::MoldRemoved(MoldRemoved {
            mold_id: cmd.mold_id,
            code: self.code.clone(),
            items: self.items.iter().copied().collect(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_usage(&self, cmd: &RecordUsage) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        let usage_count = self
            .usage_count
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("usage counter overflow"))?;

        Ok(vec![MoldEvent::UsageRecorded(UsageRecorded {
            mold_id: cmd.mold_id,
            usage_count,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reset_usage(&self, cmd: &ResetUsage) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        if self.usage_count == 0 {
            return Ok(vec![]);
        }

        Ok(vec![MoldEvent::UsageReset(UsageReset {
            mold_id: cmd.mold_id,
            previous: self.usage_count,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link(&self, cmd: &LinkItem) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        // Already linked: idempotent no-op.
        if self.items.contains(&cmd.item_id) {
            return Ok(vec![]);
        }

        Ok(vec![MoldEvent::ItemLinked(ItemLinked {
            mold_id: cmd.mold_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_unlink(&self, cmd: &UnlinkItem) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        if !self.items.contains(&cmd.item_id) {
            return Ok(vec![]);
        }

        Ok(vec![MoldEvent::ItemUnlinked(ItemUnlinked {
            mold_id: cmd.mold_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeStatus) -> Result<Vec<MoldEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_mold_id(cmd.mold_id)?;

        let mut note_line = format!(
            "[{}] {} -> {}",
            cmd.occurred_at.format("%Y-%m-%d %H:%M"),
            self.status,
            cmd.status
        );
        if let Some(note) = cmd.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            note_line.push_str(": ");
            note_line.push_str(note);
        }

        Ok(vec![MoldEvent::StatusChanged(StatusChanged {
            mold_id: cmd.mold_id,
            from: self.status,
            to: cmd.status,
            note_line,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_events::execute;
    use chrono::TimeZone;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap()
    }

    fn registered() -> Mold {
        let mold_id = MoldId::new();
        let mut mold = Mold::empty(mold_id);
        execute(
            &mut mold,
            &MoldCommand::RegisterMold(RegisterMold {
                mold_id,
                code: "M-001".to_string(),
                name: "Anillo solitario".to_string(),
                description: String::new(),
                location: Some("Estante A".to_string()),
                material: Some("silicona".to_string()),
                status: MoldStatus::Stored,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        mold
    }

    #[test]
    fn record_usage_increments_and_stamps() {
        let mut mold = registered();
        for _ in 0..3 {
            let mold_id = mold.id_typed();
            execute(
                &mut mold,
                &MoldCommand::RecordUsage(RecordUsage {
                    mold_id,
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
        }
        assert_eq!(mold.usage_count(), 3);
        assert_eq!(mold.last_used_at(), Some(test_time()));
        assert_eq!(mold.version(), 4);
    }

    #[test]
    fn link_twice_is_single_membership() {
        let mut mold = registered();
        let item = ItemId::new();
        let link = MoldCommand::LinkItem(LinkItem {
            mold_id: mold.id_typed(),
            item_id: item,
            occurred_at: test_time(),
        });

        assert_eq!(execute(&mut mold, &link).unwrap().len(), 1);
        assert!(execute(&mut mold, &link).unwrap().is_empty());
        assert_eq!(mold.items().len(), 1);
    }

    #[test]
    fn unlink_non_member_is_noop() {
        let mut mold = registered();
        let mold_id = mold.id_typed();
        let events = execute(
            &mut mold,
            &MoldCommand::UnlinkItem(UnlinkItem {
                mold_id,
                item_id: ItemId::new(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert!(events.is_empty());
        assert_eq!(mold.version(), 1);
    }

    #[test]
    fn change_status_appends_note_lines() {
        let mut mold = registered();
        let change = |status, note: Option<&str>| {
            MoldCommand::ChangeStatus(ChangeStatus {
                mold_id: mold.id_typed(),
                status,
                note: note.map(str::to_string),
                occurred_at: test_time(),
            })
        };
        let first = change(MoldStatus::Loaned, Some("prestado a Lucía"));
        let second = change(MoldStatus::Stored, None);

        execute(&mut mold, &first).unwrap();
        execute(&mut mold, &second).unwrap();

        assert_eq!(mold.status(), MoldStatus::Stored);
        assert_eq!(
            mold.notes(),
            "[2024-03-01 10:30] stored -> loaned: prestado a Lucía\n[2024-03-01 10:30] loaned -> stored"
        );
    }

    #[test]
    fn register_requires_code() {
        let mold = Mold::empty(MoldId::new());
        let err = mold
            .handle(&MoldCommand::RegisterMold(RegisterMold {
                mold_id: *mold.id(),
                code: " ".to_string(),
                name: "x".to_string(),
                description: String::new(),
                location: None,
                material: None,
                status: MoldStatus::Stored,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn update_replaces_descriptive_fields_once() {
        let mut mold = registered();
        let mold_id = mold.id_typed();
        let update = MoldCommand::UpdateMold(UpdateMold {
            mold_id,
            name: " Anillo doble ".to_string(),
            description: "dos piedras".to_string(),
            location: Some("Estante B".to_string()),
            material: Some("silicona".to_string()),
            occurred_at: test_time(),
        });

        assert_eq!(execute(&mut mold, &update).unwrap().len(), 1);
        assert!(execute(&mut mold, &update).unwrap().is_empty());
        assert_eq!(mold.name(), "Anillo doble");
        assert_eq!(mold.location(), Some("Estante B"));
        assert_eq!(mold.code(), "M-001");

        let blank = MoldCommand::UpdateMold(UpdateMold {
            mold_id,
            name: "  ".to_string(),
            description: String::new(),
            location: None,
            material: None,
            occurred_at: test_time(),
        });
        assert!(matches!(mold.handle(&blank), Err(DomainError::Validation(_))));
    }

    #[test]
    fn removal_reports_dropped_links() {
        let mut mold = registered();
        let mold_id = mold.id_typed();
        let item_id = ItemId::new();
        execute(
            &mut mold,
            &MoldCommand::LinkItem(LinkItem {
                mold_id,
                item_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let remove = MoldCommand::RemoveMold(RemoveMold {
            mold_id,
            occurred_at: test_time(),
        });
        let events = execute(&mut mold, &remove).unwrap();
        match &events[0] {
            MoldEvent::MoldRemoved(e) => assert_eq!(e.items, vec![item_id]),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(mold.items().is_empty());
        assert!(matches!(
            mold.handle(&remove),
            Err(DomainError::NotFound { entity: "mold", .. })
        ));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&MoldStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
    }
}
