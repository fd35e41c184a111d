use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use medstock_core::{DrugId, LedgerError, LedgerResult};

use crate::branch::BranchKey;

/// Threshold applied when a caller registers stock without one.
pub const DEFAULT_THRESHOLD: i32 = 50;

/// Longest drug name accepted (matches the stock table column width).
pub const MAX_DRUG_NAME_LEN: usize = 100;

/// Current balance record for one drug in one branch.
///
/// `id` is unique within the branch's stock table only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: DrugId,
    pub branch: BranchKey,
    pub drug_name: String,
    pub current_stock: i32,
    pub threshold: i32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl StockItem {
    pub fn status(&self) -> StockStatus {
        classify(self)
    }

    /// Copy of this item carrying a new committed balance.
    pub fn with_balance(&self, current_stock: i32, updated_at: DateTime<Utc>) -> Self {
        Self {
            current_stock,
            last_updated: updated_at,
            ..self.clone()
        }
    }
}

/// Validated input for registering a new stock item.
///
/// The initial balance is a baseline: registering an item never emits a movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStockItem {
    drug_name: String,
    initial_stock: i32,
    threshold: i32,
}

impl NewStockItem {
    pub fn new(drug_name: &str, initial_stock: i32, threshold: Option<i32>) -> LedgerResult<Self> {
        let drug_name = drug_name.trim();
        if drug_name.is_empty() {
            return Err(LedgerError::InvalidDrugName("drug name cannot be empty".to_string()));
        }
        if drug_name.chars().count() > MAX_DRUG_NAME_LEN {
            return Err(LedgerError::InvalidDrugName(format!(
                "drug name longer than {MAX_DRUG_NAME_LEN} characters"
            )));
        }
        if initial_stock < 0 {
            return Err(LedgerError::invalid_quantity(format!(
                "initial stock cannot be negative (got {initial_stock})"
            )));
        }
        let threshold = threshold.unwrap_or(DEFAULT_THRESHOLD);
        if threshold < 0 {
            return Err(LedgerError::invalid_quantity(format!(
                "threshold cannot be negative (got {threshold})"
            )));
        }

        Ok(Self {
            drug_name: drug_name.to_string(),
            initial_stock,
            threshold,
        })
    }

    pub fn drug_name(&self) -> &str {
        &self.drug_name
    }

    pub fn initial_stock(&self) -> i32 {
        self.initial_stock
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    /// Materialize the record once storage has assigned an id.
    pub fn into_item(self, id: DrugId, branch: BranchKey, now: DateTime<Utc>) -> StockItem {
        StockItem {
            id,
            branch,
            drug_name: self.drug_name,
            current_stock: self.initial_stock,
            threshold: self.threshold,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Display classification of a balance against its threshold. Never persisted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    Critical,
}

impl StockStatus {
    pub fn label(self) -> &'static str {
        match self {
            StockStatus::InStock => "In Stock",
            StockStatus::LowStock => "Low Stock",
            StockStatus::Critical => "Critical",
        }
    }
}

pub fn classify(item: &StockItem) -> StockStatus {
    classify_level(item.current_stock, item.threshold)
}

/// Above threshold: in stock. Above half the threshold: low. Otherwise critical.
///
/// Half is exact (`2 * current > threshold`), so odd thresholds are not rounded.
pub fn classify_level(current_stock: i32, threshold: i32) -> StockStatus {
    let current = i64::from(current_stock);
    let threshold = i64::from(threshold);

    if current > threshold {
        StockStatus::InStock
    } else if current * 2 > threshold {
        StockStatus::LowStock
    } else {
        StockStatus::Critical
    }
}
