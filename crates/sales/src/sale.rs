use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{
    Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ItemId, Money, SaleId,
    ValidationError,
};
use atelier_events::Event;

/// Status machine: `pending -> paid -> shipped -> delivered`, with
/// `cancelled` reachable from `pending` or `paid` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Paid => "paid",
            SaleStatus::Shipped => "shipped",
            SaleStatus::Delivered => "delivered",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        use SaleStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Paid, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
        )
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the sale happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SaleChannel {
    #[default]
    Store,
    Fair {
        name: String,
        #[serde(default)]
        location: Option<String>,
    },
    Etsy {
        order_id: String,
        #[serde(default)]
        tracking_number: Option<String>,
    },
    Other,
}

/// Sale line: item, quantity, unit price read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: Money,
}

impl SaleLine {
    pub fn line_total(&self) -> Option<Money> {
        let quantity = u64::try_from(self.quantity).ok()?;
        self.unit_price.checked_mul(quantity)
    }
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    id: SaleId,
    customer_id: CustomerId,
    channel: SaleChannel,
    status: SaleStatus,
    lines: Vec<SaleLine>,
    total: Money,
    notes: Option<String>,
    placed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    version: u64,
    #[serde(skip)]
    created: bool,
}

impl Sale {
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            customer_id: CustomerId::default(),
            channel: SaleChannel::Store,
            status: SaleStatus::Pending,
            lines: Vec::new(),
            total: Money::ZERO,
            notes: None,
            placed_at: None,
            paid_at: None,
            shipped_at: None,
            cancelled_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn channel(&self) -> &SaleChannel {
        &self.channel
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn lines(&self) -> &[SaleLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceSale. Lines arrive already priced from catalog reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceSale {
    pub sale_id: SaleId,
    pub customer_id: CustomerId,
    pub channel: SaleChannel,
    pub notes: Option<String>,
    pub lines: Vec<SaleLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeSaleStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSaleStatus {
    pub sale_id: SaleId,
    pub status: SaleStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    PlaceSale(PlaceSale),
    ChangeSaleStatus(ChangeSaleStatus),
}

/// Event: SalePlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalePlaced {
    pub sale_id: SaleId,
    pub customer_id: CustomerId,
    pub channel: SaleChannel,
    pub notes: Option<String>,
    pub lines: Vec<SaleLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SaleStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleStatusChanged {
    pub sale_id: SaleId,
    pub from: SaleStatus,
    pub to: SaleStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SalePlaced(SalePlaced),
    SaleStatusChanged(SaleStatusChanged),
}

impl SaleEvent {
    pub fn sale_id(&self) -> SaleId {
        match self {
            SaleEvent::SalePlaced(e) => e.sale_id,
            SaleEvent::SaleStatusChanged(e) => e.sale_id,
        }
    }
}

impl Event for SaleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SalePlaced(_) => "sales.sale.placed",
            SaleEvent::SaleStatusChanged(_) => "sales.sale.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            SaleEvent::SalePlaced(e) => e.occurred_at,
            SaleEvent::SaleStatusChanged(e) => e.occurred_at,
        }
    }

    fn record_id(&self) -> AggregateId {
        self.sale_id().into()
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SalePlaced(e) => {
                self.id = e.sale_id;
                self.customer_id = e.customer_id;
                self.channel = e.channel.clone();
                self.notes = e.notes.clone();
                self.lines = e.lines.clone();
                self.total = e.total;
                self.status = SaleStatus::Pending;
                self.placed_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::SaleStatusChanged(e) => {
                self.status = e.to;
                match e.to {
                    SaleStatus::Paid => self.paid_at = Some(e.occurred_at),
                    SaleStatus::Shipped => self.shipped_at = Some(e.occurred_at),
                    SaleStatus::Cancelled => self.cancelled_at = Some(e.occurred_at),
                    SaleStatus::Pending | SaleStatus::Delivered => {}
                }
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::PlaceSale(cmd) => self.handle_place(cmd),
            SaleCommand::ChangeSaleStatus(cmd) => self.handle_change_status(cmd),
        }
    }
}

impl Sale {
    fn ensure_sale_id(&self, sale_id: SaleId) -> Result<(), DomainError> {
        if self.id != sale_id {
            return Err(DomainError::invariant("sale_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("sale already exists"));
        }
        self.ensure_sale_id(cmd.sale_id)?;

        if cmd.lines.is_empty() {
            return Err(ValidationError::EmptySale.into());
        }

        let mut total = Money::ZERO;
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(ValidationError::NonPositiveQuantity {
                    item_id: line.item_id,
                    quantity: line.quantity,
                }
                .into());
            }
            total = line
                .line_total()
                .and_then(|t| total.checked_add(t))
                .ok_or(ValidationError::AmountOverflow)?;
        }

        Ok(vec![SaleEvent::SalePlaced(SalePlaced {
            sale_id: cmd.sale_id,
            customer_id: cmd.customer_id,
            channel: cmd.channel.clone(),
            notes: cmd.notes.clone(),
            lines: cmd.lines.clone(),
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_status(&self, cmd: &ChangeSaleStatus) -> Result<Vec<SaleEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("sale", self.id));
        }
        self.ensure_sale_id(cmd.sale_id)?;

        if !self.status.can_transition_to(cmd.status) {
            return Err(DomainError::invalid_transition(self.status, cmd.status));
        }

        Ok(vec![SaleEvent::SaleStatusChanged(SaleStatusChanged {
            sale_id: cmd.sale_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
