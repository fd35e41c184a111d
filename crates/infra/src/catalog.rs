//! Per-branch stock records: listing, lookup and creation.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use medstock_core::{DrugId, LedgerError, LedgerResult};
use medstock_inventory::{NewStockItem, StockItem};

use crate::ledger_store::{ItemOrder, LedgerStore};
use crate::registry::BranchRegistry;

/// Branch-scoped view over a [`LedgerStore`].
///
/// Every operation resolves the branch through the registry first, so input
/// outside the allow-list fails with `UnknownBranch` without touching storage.
#[derive(Debug, Clone)]
pub struct StockCatalog<S> {
    store: S,
    registry: Arc<BranchRegistry>,
}

impl<S> StockCatalog<S>
where
    S: LedgerStore,
{
    pub fn new(store: S, registry: Arc<BranchRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn registry(&self) -> &BranchRegistry {
        &self.registry
    }

    pub async fn list_items(&self, branch: &str, order: ItemOrder) -> LedgerResult<Vec<StockItem>> {
        let handle = self.registry.resolve(branch)?;
        Ok(self.store.list_items(&handle, order).await?)
    }

    /// Items of every registered branch, concatenated in registry order.
    ///
    /// Each branch is read independently; there is no single-instant snapshot
    /// across branches.
    pub async fn list_all(&self) -> LedgerResult<Vec<StockItem>> {
        let mut all = Vec::new();
        for handle in self.registry.handles() {
            all.extend(self.store.list_items(&handle, ItemOrder::Ascending).await?);
        }
        Ok(all)
    }

    pub async fn get_item(&self, branch: &str, drug_id: DrugId) -> LedgerResult<StockItem> {
        let handle = self.registry.resolve(branch)?;
        self.store
            .get_item(&handle, drug_id)
            .await?
            .ok_or_else(|| LedgerError::drug_not_found(handle.branch().as_str(), drug_id))
    }

    /// Insert a record whose balance is the baseline `initial_stock`. No movement is written.
    #[instrument(skip(self), err)]
    pub async fn create_item(
        &self,
        branch: &str,
        drug_name: &str,
        initial_stock: i32,
        threshold: Option<i32>,
    ) -> LedgerResult<StockItem> {
        let handle = self.registry.resolve(branch)?;
        let new_item = NewStockItem::new(drug_name, initial_stock, threshold)?;

        let item = self.store.insert_item(&handle, new_item, Utc::now()).await?;
        tracing::info!(branch = %item.branch, drug_id = %item.id, "stock item created");
        Ok(item)
    }
}
