use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use medstock_core::{DrugId, LedgerError};
use medstock_inventory::{BranchKey, Movement, NewMovement, NewStockItem, StockItem};

use crate::registry::StoreHandle;

/// Storage operation error.
///
/// These are **infrastructure errors** as opposed to ledger rule violations.
/// Every variant surfaces to callers as a retryable `TransactionFailure`, except
/// `DuplicateRequest`, which is a client-side idempotency conflict.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate request id: {0}")]
    DuplicateRequest(String),

    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Other(String),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateRequest(msg) => LedgerError::IdempotencyConflict(msg),
            other => LedgerError::transaction_failure(other.to_string()),
        }
    }
}

/// Ordering of `list_items` by insertion id.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ItemOrder {
    #[default]
    Ascending,
    Descending,
}

impl ItemOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            ItemOrder::Ascending => "ASC",
            ItemOrder::Descending => "DESC",
        }
    }
}

/// Per-branch stock records.
///
/// Reads never lock and observe committed state only. All balance changes go
/// through a [`LedgerTransaction`] opened with [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_items(&self, handle: &StoreHandle, order: ItemOrder) -> Result<Vec<StockItem>, StoreError>;

    async fn get_item(&self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError>;

    /// Insert a new record whose balance is the item's initial stock. Writes no movement.
    async fn insert_item(
        &self,
        handle: &StoreHandle,
        item: NewStockItem,
        now: DateTime<Utc>,
    ) -> Result<StockItem, StoreError>;

    /// Open a unit of work. Dropping it without `commit` rolls everything back.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError>;
}

/// One all-or-nothing unit of work against a branch table and the movement log.
///
/// Nothing written through a transaction is visible to other readers before
/// `commit` returns successfully.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read a stock row and hold an exclusive lock on it until commit/rollback.
    ///
    /// Returns `None` (and holds nothing) when the row does not exist.
    async fn lock_item(&mut self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError>;

    /// Committed (or staged in this transaction) movement carrying `request_id`.
    async fn find_movement_by_request(&mut self, request_id: Uuid) -> Result<Option<Movement>, StoreError>;

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError>;

    /// Overwrite the balance of a row previously locked in this transaction.
    async fn write_balance(
        &mut self,
        handle: &StoreHandle,
        drug_id: DrugId,
        current_stock: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read path over the shared movement log.
#[async_trait]
pub trait MovementLog: Send + Sync {
    /// Movements for one item, most recent first (ties broken by id, newest first).
    async fn movements_for(&self, branch: BranchKey, drug_id: DrugId) -> Result<Vec<Movement>, StoreError>;
}

/// A complete ledger backend: stock tables plus movement log.
pub trait LedgerBackend: LedgerStore + MovementLog {}

impl<T> LedgerBackend for T where T: LedgerStore + MovementLog + ?Sized {}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn list_items(&self, handle: &StoreHandle, order: ItemOrder) -> Result<Vec<StockItem>, StoreError> {
        (**self).list_items(handle, order).await
    }

    async fn get_item(&self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError> {
        (**self).get_item(handle, drug_id).await
    }

    async fn insert_item(
        &self,
        handle: &StoreHandle,
        item: NewStockItem,
        now: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        (**self).insert_item(handle, item, now).await
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        (**self).begin().await
    }
}

#[async_trait]
impl<L> MovementLog for Arc<L>
where
    L: MovementLog + ?Sized,
{
    async fn movements_for(&self, branch: BranchKey, drug_id: DrugId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements_for(branch, drug_id).await
    }
}
