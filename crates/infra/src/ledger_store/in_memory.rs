use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};
use uuid::Uuid;

use medstock_core::{DrugId, MovementId};
use medstock_inventory::{BranchKey, Movement, NewMovement, NewStockItem, StockItem};

use super::r#trait::{ItemOrder, LedgerStore, LedgerTransaction, MovementLog, StoreError};
use crate::registry::StoreHandle;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    branch: BranchKey,
    drug_id: DrugId,
}

#[derive(Debug, Default)]
struct LedgerState {
    tables: HashMap<BranchKey, BTreeMap<DrugId, StockItem>>,
    next_drug_id: HashMap<BranchKey, i32>,
    movements: Vec<Movement>,
}

#[derive(Debug, Default)]
struct Shared {
    state: RwLock<LedgerState>,
    row_locks: Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>,
    // Sequence semantics: ids handed out by rolled-back transactions are not reused.
    next_movement_id: AtomicI64,
}

impl Shared {
    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Other("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Other("lock poisoned".to_string()))
    }

    /// Lock handle for an existing row; `None` (and no map entry) when the row is absent.
    ///
    /// Rows are never deleted, so existence checked here still holds once the lock is taken.
    fn row_lock(&self, key: RowKey) -> Result<Option<Arc<RowMutex<()>>>, StoreError> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| StoreError::Other("lock poisoned".to_string()))?;
        if let Some(lock) = locks.get(&key) {
            return Ok(Some(lock.clone()));
        }
        if self.committed_item(key)?.is_none() {
            return Ok(None);
        }
        Ok(Some(locks.entry(key).or_default().clone()))
    }

    fn committed_item(&self, key: RowKey) -> Result<Option<StockItem>, StoreError> {
        let state = self.read()?;
        Ok(state
            .tables
            .get(&key.branch)
            .and_then(|table| table.get(&key.drug_id))
            .cloned())
    }
}

/// In-memory ledger backend.
///
/// Intended for tests/dev. Row locks are per `(branch, drug_id)` async mutexes
/// held by a transaction until it commits or is dropped; writes are staged in
/// the transaction and published under one write lock at commit, so readers
/// never observe a half-applied movement.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    shared: Arc<Shared>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn list_items(&self, handle: &StoreHandle, order: ItemOrder) -> Result<Vec<StockItem>, StoreError> {
        let state = self.shared.read()?;
        let mut items: Vec<StockItem> = state
            .tables
            .get(&handle.branch())
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default();
        if order == ItemOrder::Descending {
            items.reverse();
        }
        Ok(items)
    }

    async fn get_item(&self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError> {
        self.shared.committed_item(RowKey {
            branch: handle.branch(),
            drug_id,
        })
    }

    async fn insert_item(
        &self,
        handle: &StoreHandle,
        item: NewStockItem,
        now: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        let branch = handle.branch();
        let mut state = self.shared.write()?;

        let next = state.next_drug_id.entry(branch).or_insert(0);
        *next += 1;
        let id = DrugId::new(*next);

        let stored = item.into_item(id, branch, now);
        state.tables.entry(branch).or_default().insert(id, stored.clone());
        Ok(stored)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            shared: self.shared.clone(),
            locked: HashMap::new(),
            staged_movements: Vec::new(),
        }))
    }
}

#[async_trait]
impl MovementLog for InMemoryLedger {
    async fn movements_for(&self, branch: BranchKey, drug_id: DrugId) -> Result<Vec<Movement>, StoreError> {
        let state = self.shared.read()?;
        let mut movements: Vec<Movement> = state
            .movements
            .iter()
            .filter(|m| m.branch == branch && m.drug_id == drug_id)
            .cloned()
            .collect();
        movements.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(b.id.cmp(&a.id)));
        Ok(movements)
    }
}

struct LockedRow {
    _guard: OwnedMutexGuard<()>,
    item: StockItem,
    staged: Option<StockItem>,
}

struct InMemoryTransaction {
    shared: Arc<Shared>,
    locked: HashMap<RowKey, LockedRow>,
    staged_movements: Vec<Movement>,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_item(&mut self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError> {
        let key = RowKey {
            branch: handle.branch(),
            drug_id,
        };
        if let Some(row) = self.locked.get(&key) {
            return Ok(Some(row.staged.clone().unwrap_or_else(|| row.item.clone())));
        }

        let Some(row_lock) = self.shared.row_lock(key)? else {
            return Ok(None);
        };
        let guard = row_lock.lock_owned().await;

        // Read after acquiring the lock: every writer of this row holds it until commit.
        match self.shared.committed_item(key)? {
            Some(item) => {
                self.locked.insert(
                    key,
                    LockedRow {
                        _guard: guard,
                        item: item.clone(),
                        staged: None,
                    },
                );
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn find_movement_by_request(&mut self, request_id: Uuid) -> Result<Option<Movement>, StoreError> {
        if let Some(m) = self
            .staged_movements
            .iter()
            .find(|m| m.request_id == Some(request_id))
        {
            return Ok(Some(m.clone()));
        }
        let state = self.shared.read()?;
        Ok(state
            .movements
            .iter()
            .find(|m| m.request_id == Some(request_id))
            .cloned())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        let id = self.shared.next_movement_id.fetch_add(1, Ordering::SeqCst) + 1;
        let movement = movement.into_movement(MovementId::new(id));
        self.staged_movements.push(movement.clone());
        Ok(movement)
    }

    async fn write_balance(
        &mut self,
        handle: &StoreHandle,
        drug_id: DrugId,
        current_stock: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        if current_stock < 0 {
            return Err(StoreError::Constraint(format!(
                "current_stock must be >= 0 (got {current_stock})"
            )));
        }
        let key = RowKey {
            branch: handle.branch(),
            drug_id,
        };
        let row = self.locked.get_mut(&key).ok_or_else(|| {
            StoreError::Constraint(format!("row {drug_id} in {} is not locked", handle.table()))
        })?;

        let updated = row.item.with_balance(current_stock, updated_at);
        row.staged = Some(updated.clone());
        Ok(updated)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction {
            shared,
            locked,
            staged_movements,
        } = *self;

        {
            let mut state = shared.write()?;

            for m in &staged_movements {
                if let Some(request_id) = m.request_id {
                    if state.movements.iter().any(|e| e.request_id == Some(request_id)) {
                        return Err(StoreError::DuplicateRequest(request_id.to_string()));
                    }
                }
            }

            for row in locked.values() {
                if let Some(item) = &row.staged {
                    state
                        .tables
                        .entry(item.branch)
                        .or_default()
                        .insert(item.id, item.clone());
                }
            }
            state.movements.extend(staged_movements);
        }

        // Row locks are released only after the writes are published.
        drop(locked);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
