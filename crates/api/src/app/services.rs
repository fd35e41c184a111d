//! Ledger wiring: backend selection, schema bootstrap and pool lifecycle.

use std::sync::Arc;

use sqlx::PgPool;

use medstock_infra::{
    BackendKind, InMemoryLedger, LedgerBackend, LedgerConfig, LedgerService, PostgresLedger, StoreError, db,
};

/// Backend shared by every request handler.
pub type SharedBackend = Arc<dyn LedgerBackend>;

pub struct AppServices {
    pub ledger: LedgerService<SharedBackend>,
    pool: Option<PgPool>,
}

impl AppServices {
    /// Select the backend from configuration. Postgres setup creates missing tables.
    pub async fn build(config: &LedgerConfig) -> Result<Self, StoreError> {
        match &config.backend {
            BackendKind::InMemory => {
                tracing::warn!("USE_PERSISTENT_STORES is off; stock data lives in memory only");
                Ok(Self::in_memory(config))
            }
            BackendKind::Postgres(db_config) => {
                let pool = db::connect(db_config).await?;
                db::ensure_schema(&pool, &config.registry()).await?;

                let backend: SharedBackend = Arc::new(PostgresLedger::new(pool.clone()));
                Ok(Self {
                    ledger: LedgerService::from_config(backend, config),
                    pool: Some(pool),
                })
            }
        }
    }

    /// In-memory wiring (dev/test).
    pub fn in_memory(config: &LedgerConfig) -> Self {
        let backend: SharedBackend = Arc::new(InMemoryLedger::new());
        Self {
            ledger: LedgerService::from_config(backend, config),
            pool: None,
        }
    }

    /// Drain the connection pool, if any. Call after the server stops accepting requests.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            db::shutdown(pool.clone()).await;
        }
    }
}
