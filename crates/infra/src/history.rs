use std::sync::Arc;

use medstock_core::{DrugId, LedgerResult};
use medstock_inventory::Movement;

use crate::ledger_store::MovementLog;
use crate::registry::BranchRegistry;

/// Read path over the movement log. Each call is an independent read.
#[derive(Debug, Clone)]
pub struct HistoryReader<L> {
    log: L,
    registry: Arc<BranchRegistry>,
}

impl<L> HistoryReader<L>
where
    L: MovementLog,
{
    pub fn new(log: L, registry: Arc<BranchRegistry>) -> Self {
        Self { log, registry }
    }

    /// Movements for one item, most recent first. Unknown drugs have an empty history.
    pub async fn get_history(&self, branch: &str, drug_id: DrugId) -> LedgerResult<Vec<Movement>> {
        let handle = self.registry.resolve(branch)?;
        Ok(self.log.movements_for(handle.branch(), drug_id).await?)
    }
}
