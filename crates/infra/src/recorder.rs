//! Atomic stock movements.
//!
//! One call to [`MovementRecorder::apply_movement`] is one unit of work:
//!
//! 1. validate the quantity and resolve the branch (no storage access)
//! 2. open a transaction and lock the item row until commit
//! 3. compute the new balance; `OUT` below zero aborts with `InsufficientStock`
//! 4. append the movement, write the balance, commit
//!
//! Any error after step 2 rolls the transaction back, so neither the movement
//! nor the balance change is ever visible on its own. The whole unit of work
//! runs under a timeout; when it fires the transaction is dropped (which rolls
//! it back) and the caller gets a retryable `TransactionFailure`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use medstock_core::{DrugId, LedgerError, LedgerResult};
use medstock_inventory::{Movement, MovementType, NewMovement, Quantity, StockItem, next_balance};

use crate::ledger_store::{LedgerStore, LedgerTransaction};
use crate::registry::{BranchRegistry, StoreHandle};

/// A requested stock change. `quantity` is validated by the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub drug_id: DrugId,
    pub movement_type: MovementType,
    pub quantity: i32,
    /// Optional idempotency key. Reusing it replays the first result.
    #[serde(default)]
    pub request_id: Option<Uuid>,
}

impl MovementRequest {
    pub fn new(drug_id: DrugId, movement_type: MovementType, quantity: i32) -> Self {
        Self {
            drug_id,
            movement_type,
            quantity,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = Some(request_id);
        self
    }
}

/// Committed result of a movement: the post-movement item and the movement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub item: StockItem,
    pub movement: Movement,
    /// True when `request_id` matched an earlier movement and nothing new was written.
    pub replayed: bool,
}

#[derive(Debug)]
enum Outcome {
    Applied(MovementReceipt),
    Replayed(MovementReceipt),
}

#[derive(Debug, Clone)]
pub struct MovementRecorder<S> {
    store: S,
    registry: Arc<BranchRegistry>,
    tx_timeout: Duration,
}

impl<S> MovementRecorder<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, registry: Arc<BranchRegistry>, tx_timeout: Duration) -> Self {
        Self {
            store,
            registry,
            tx_timeout,
        }
    }

    #[instrument(
        skip(self, request),
        fields(
            branch = %branch,
            drug_id = %request.drug_id,
            movement_type = %request.movement_type,
            quantity = request.quantity
        ),
        err
    )]
    pub async fn apply_movement(&self, branch: &str, request: MovementRequest) -> LedgerResult<MovementReceipt> {
        let quantity = Quantity::new(request.quantity)?;
        let handle = self.registry.resolve(branch)?;

        match tokio::time::timeout(self.tx_timeout, self.run(handle, &request, quantity)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.tx_timeout.as_millis() as u64, "movement transaction timed out; rolled back");
                Err(LedgerError::transaction_failure(format!(
                    "transaction timed out after {}ms",
                    self.tx_timeout.as_millis()
                )))
            }
        }
    }

    async fn run(&self, handle: StoreHandle, request: &MovementRequest, quantity: Quantity) -> LedgerResult<MovementReceipt> {
        let mut tx = self.store.begin().await?;

        match decide(tx.as_mut(), &handle, request, quantity).await {
            Ok(Outcome::Applied(receipt)) => {
                tx.commit().await?;
                tracing::info!(
                    movement_id = %receipt.movement.id,
                    current_stock = receipt.item.current_stock,
                    "movement committed"
                );
                Ok(receipt)
            }
            Ok(Outcome::Replayed(receipt)) => {
                discard(tx).await;
                tracing::info!(movement_id = %receipt.movement.id, "replayed movement for known request id");
                Ok(receipt)
            }
            Err(err) => {
                discard(tx).await;
                Err(err)
            }
        }
    }
}

/// Steps 2-4 against an open transaction. Never commits.
async fn decide(
    tx: &mut dyn LedgerTransaction,
    handle: &StoreHandle,
    request: &MovementRequest,
    quantity: Quantity,
) -> LedgerResult<Outcome> {
    let current = tx
        .lock_item(handle, request.drug_id)
        .await?
        .ok_or_else(|| LedgerError::drug_not_found(handle.branch().as_str(), request.drug_id))?;

    let now = Utc::now();
    let pending = NewMovement {
        branch: handle.branch(),
        drug_id: request.drug_id,
        movement_type: request.movement_type,
        quantity,
        occurred_at: now,
        request_id: request.request_id,
    };

    // Checked under the row lock so a concurrent retry of the same request sees the first commit.
    if let Some(request_id) = request.request_id {
        if let Some(existing) = tx.find_movement_by_request(request_id).await? {
            if !pending.matches(&existing) {
                return Err(LedgerError::IdempotencyConflict(format!(
                    "request id {request_id} was already used for movement {}",
                    existing.id
                )));
            }
            return Ok(Outcome::Replayed(MovementReceipt {
                item: current,
                movement: existing,
                replayed: true,
            }));
        }
    }

    let balance = next_balance(current.current_stock, request.movement_type, quantity)?;
    let movement = tx.append_movement(pending).await?;
    let item = tx.write_balance(handle, request.drug_id, balance, now).await?;

    Ok(Outcome::Applied(MovementReceipt {
        item,
        movement,
        replayed: false,
    }))
}

async fn discard(tx: Box<dyn LedgerTransaction>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed; transaction will be discarded by the backend");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::{InMemoryLedger, MovementLog};

    async fn setup(initial: i32) -> (MovementRecorder<InMemoryLedger>, InMemoryLedger, StockItem) {
        let store = InMemoryLedger::new();
        let registry = Arc::new(BranchRegistry::all());
        let handle = registry.resolve("namakkal").unwrap();
        let item = store
            .insert_item(
                &handle,
                medstock_inventory::NewStockItem::new("Amoxicillin", initial, Some(50)).unwrap(),
                Utc::now(),
            )
            .await
            .unwrap();
        let recorder = MovementRecorder::new(store.clone(), registry, Duration::from_secs(5));
        (recorder, store, item)
    }

    #[tokio::test]
    async fn in_and_out_adjust_the_balance() {
        let (recorder, _store, item) = setup(100).await;

        let r = recorder
            .apply_movement("namakkal", MovementRequest::new(item.id, MovementType::In, 50))
            .await
            .unwrap();
        assert_eq!(r.item.current_stock, 150);
        assert_eq!(r.movement.quantity, 50);
        assert!(!r.replayed);

        let r = recorder
            .apply_movement("namakkal", MovementRequest::new(item.id, MovementType::Out, 150))
            .await
            .unwrap();
        assert_eq!(r.item.current_stock, 0);
        assert!(r.item.last_updated >= item.last_updated);
    }

    #[tokio::test]
    async fn non_positive_quantity_is_rejected_before_branch_resolution() {
        let (recorder, _store, item) = setup(100).await;

        let err = recorder
            .apply_movement("atlantis", MovementRequest::new(item.id, MovementType::In, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidQuantity(_)));
    }

    #[tokio::test]
    async fn unknown_drug_writes_nothing() {
        let (recorder, store, item) = setup(100).await;
        let missing = DrugId::new(item.id.get() + 1);

        let err = recorder
            .apply_movement("namakkal", MovementRequest::new(missing, MovementType::In, 5))
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::drug_not_found("namakkal", missing));
        assert!(store.movements_for(item.branch, missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reused_request_id_replays_or_conflicts() {
        let (recorder, store, item) = setup(100).await;
        let request_id = Uuid::now_v7();
        let request = MovementRequest::new(item.id, MovementType::Out, 10).with_request_id(request_id);

        let first = recorder.apply_movement("namakkal", request.clone()).await.unwrap();
        let again = recorder.apply_movement("namakkal", request).await.unwrap();

        assert!(again.replayed);
        assert_eq!(again.movement, first.movement);
        assert_eq!(again.item.current_stock, 90);
        assert_eq!(store.movements_for(item.branch, item.id).await.unwrap().len(), 1);

        let err = recorder
            .apply_movement(
                "namakkal",
                MovementRequest::new(item.id, MovementType::Out, 11).with_request_id(request_id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::IdempotencyConflict(_)));
    }
}
