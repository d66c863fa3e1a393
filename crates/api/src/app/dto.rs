use serde::{Deserialize, Serialize};

use atelier_core::{CategoryId, Money};
use atelier_molds::MoldStatus;
use atelier_notifications::{NotificationKind, StockLevel};
use atelier_sales::SaleStatus;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SetStockRequest {
    pub stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct MoveCategoryRequest {
    #[serde(default)]
    pub parent: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceSaleRequest {
    pub status: SaleStatus,
}

#[derive(Debug, Deserialize)]
pub struct ChangeMoldStatusRequest {
    pub status: MoldStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockLevelsRequest {
    pub levels: Vec<StockLevel>,
}

// -------------------------
// Query strings (ids arrive as strings and are parsed by the handler)
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    /// `active=all` lists inactive items too.
    pub active: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleListQuery {
    pub status: Option<SaleStatus>,
    pub customer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub unread: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct InventoryValueResponse {
    pub value: Money,
    pub formatted: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}
