use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medstock_core::{DrugId, MovementId};
use medstock_infra::MovementReceipt;
use medstock_inventory::{Branch, BranchKey, Movement, MovementType, StockItem, StockStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateStockRequest {
    pub drug_name: String,
    pub current_stock: i32,
    pub threshold: Option<i32>,
}

/// `movement_type` stays a string here so an unknown value maps to
/// `invalid_movement_type` instead of a generic JSON rejection.
#[derive(Debug, Deserialize)]
pub struct MovementRequestBody {
    pub movement_type: String,
    pub quantity: i32,
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BranchView {
    pub key: BranchKey,
    pub display_name: String,
}

impl From<Branch> for BranchView {
    fn from(b: Branch) -> Self {
        Self {
            key: b.key,
            display_name: b.display_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StockItemView {
    pub id: DrugId,
    pub branch: BranchKey,
    pub branch_name: &'static str,
    pub drug_name: String,
    pub current_stock: i32,
    pub threshold: i32,
    pub status: StockStatus,
    pub status_label: &'static str,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl From<StockItem> for StockItemView {
    fn from(item: StockItem) -> Self {
        let status = item.status();
        Self {
            id: item.id,
            branch: item.branch,
            branch_name: item.branch.display_name(),
            drug_name: item.drug_name,
            current_stock: item.current_stock,
            threshold: item.threshold,
            status,
            status_label: status.label(),
            created_at: item.created_at,
            last_updated: item.last_updated,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementView {
    pub id: MovementId,
    pub branch: BranchKey,
    pub drug_id: DrugId,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

impl From<Movement> for MovementView {
    fn from(m: Movement) -> Self {
        Self {
            id: m.id,
            branch: m.branch,
            drug_id: m.drug_id,
            movement_type: m.movement_type,
            quantity: m.quantity,
            occurred_at: m.occurred_at,
            request_id: m.request_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementReceiptView {
    pub item: StockItemView,
    pub movement: MovementView,
    pub replayed: bool,
}

impl From<MovementReceipt> for MovementReceiptView {
    fn from(r: MovementReceipt) -> Self {
        Self {
            item: r.item.into(),
            movement: r.movement.into(),
            replayed: r.replayed,
        }
    }
}

pub fn items_to_views(items: Vec<StockItem>) -> Vec<StockItemView> {
    items.into_iter().map(StockItemView::from).collect()
}
