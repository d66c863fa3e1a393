use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelier_core::{Aggregate, CustomerId, DomainError, DomainResult, SaleId};

use crate::sale::{ChangeSaleStatus, PlaceSale, Sale, SaleCommand, SaleEvent, SaleStatus};

/// Ledger query. The default matches every sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleQuery {
    #[serde(default)]
    pub status: Option<SaleStatus>,
    #[serde(default)]
    pub customer: Option<CustomerId>,
}

impl SaleQuery {
    fn matches(&self, sale: &Sale) -> bool {
        self.status.is_none_or(|s| s == sale.status())
            && self.customer.is_none_or(|c| c == sale.customer_id())
    }
}

/// Append-only record of sales. Status changes are the only mutation a
/// committed sale accepts.
#[derive(Debug, Clone, Default)]
pub struct SaleLedger {
    sales: HashMap<SaleId, Sale>,
    /// Commit order.
    order: Vec<SaleId>,
}

impl SaleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SaleId) -> Option<&Sale> {
        self.sales.get(&id)
    }

    pub fn require(&self, id: SaleId) -> DomainResult<&Sale> {
        self.sales
            .get(&id)
            .ok_or_else(|| DomainError::not_found("sale", id))
    }

    /// Newest first.
    pub fn list<'a>(&'a self, query: &SaleQuery) -> impl Iterator<Item = &'a Sale> + use<'a> {
        let query = *query;
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.sales.get(id))
            .filter(move |s| query.matches(s))
    }

    pub fn len(&self) -> usize {
        self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty()
    }

    /// Decide a new sale without recording it.
    pub fn decide_place(&self, cmd: PlaceSale) -> DomainResult<Vec<SaleEvent>> {
        if self.sales.contains_key(&cmd.sale_id) {
            return Err(DomainError::conflict(format!("sale {} already exists", cmd.sale_id)));
        }
        Sale::empty(cmd.sale_id).handle(&SaleCommand::PlaceSale(cmd))
    }

    pub fn decide_transition(
        &self,
        id: SaleId,
        status: SaleStatus,
        at: DateTime<Utc>,
    ) -> DomainResult<Vec<SaleEvent>> {
        self.require(id)?
            .handle(&SaleCommand::ChangeSaleStatus(ChangeSaleStatus {
                sale_id: id,
                status,
                occurred_at: at,
            }))
    }

    /// Apply events decided earlier by this ledger.
    pub fn apply(&mut self, events: &[SaleEvent]) {
        for ev in events {
            let id = ev.sale_id();
            if !self.sales.contains_key(&id) {
                self.order.push(id);
            }
            self.sales.entry(id).or_insert_with(|| Sale::empty(id)).apply(ev);
        }
    }
}
