//! Caller-facing ledger facade.
//!
//! Wires the catalog, recorder and history reader over one backend and one
//! branch registry. Transports (HTTP, chat tooling) talk to this type only.

use std::sync::Arc;
use std::time::Duration;

use medstock_core::{DrugId, LedgerResult};
use medstock_inventory::{Branch, Movement, MovementType, StockItem};

use crate::catalog::StockCatalog;
use crate::config::LedgerConfig;
use crate::history::HistoryReader;
use crate::ledger_store::{ItemOrder, LedgerBackend};
use crate::recorder::{MovementReceipt, MovementRecorder, MovementRequest};
use crate::registry::BranchRegistry;

#[derive(Debug, Clone)]
pub struct LedgerService<S> {
    registry: Arc<BranchRegistry>,
    catalog: StockCatalog<S>,
    recorder: MovementRecorder<S>,
    history: HistoryReader<S>,
}

impl<S> LedgerService<S>
where
    S: LedgerBackend + Clone,
{
    pub fn new(store: S, registry: BranchRegistry, tx_timeout: Duration) -> Self {
        let registry = Arc::new(registry);
        Self {
            catalog: StockCatalog::new(store.clone(), registry.clone()),
            recorder: MovementRecorder::new(store.clone(), registry.clone(), tx_timeout),
            history: HistoryReader::new(store, registry.clone()),
            registry,
        }
    }

    pub fn from_config(store: S, config: &LedgerConfig) -> Self {
        Self::new(store, config.registry(), config.tx_timeout)
    }

    pub fn list_branches(&self) -> Vec<Branch> {
        self.registry.branches().to_vec()
    }

    pub async fn list_stock(&self, branch: &str) -> LedgerResult<Vec<StockItem>> {
        self.catalog.list_items(branch, ItemOrder::Ascending).await
    }

    pub async fn list_all_stock(&self) -> LedgerResult<Vec<StockItem>> {
        self.catalog.list_all().await
    }

    pub async fn get_item(&self, branch: &str, drug_id: DrugId) -> LedgerResult<StockItem> {
        self.catalog.get_item(branch, drug_id).await
    }

    pub async fn add_initial_stock(
        &self,
        branch: &str,
        drug_name: &str,
        initial_stock: i32,
        threshold: Option<i32>,
    ) -> LedgerResult<StockItem> {
        self.catalog
            .create_item(branch, drug_name, initial_stock, threshold)
            .await
    }

    /// Apply one movement and return the committed item.
    pub async fn apply_movement(
        &self,
        branch: &str,
        drug_id: DrugId,
        movement_type: MovementType,
        quantity: i32,
    ) -> LedgerResult<StockItem> {
        let receipt = self
            .recorder
            .apply_movement(branch, MovementRequest::new(drug_id, movement_type, quantity))
            .await?;
        Ok(receipt.item)
    }

    /// Like [`apply_movement`](Self::apply_movement), returning the full receipt.
    pub async fn record_movement(&self, branch: &str, request: MovementRequest) -> LedgerResult<MovementReceipt> {
        self.recorder.apply_movement(branch, request).await
    }

    pub async fn get_history(&self, branch: &str, drug_id: DrugId) -> LedgerResult<Vec<Movement>> {
        self.history.get_history(branch, drug_id).await
    }
}
