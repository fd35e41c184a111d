//! Connection pool lifecycle and schema bootstrap.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::ledger_store::StoreError;
use crate::ledger_store::postgres::map_sqlx_error;
use crate::registry::BranchRegistry;

/// Open the process-wide pool and verify it answers.
#[instrument(skip(config), fields(max_connections = config.max_connections), err)]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| map_sqlx_error("ping", e))?;

    tracing::info!("connected to postgres");
    Ok(pool)
}

/// Create the stock table of every registered branch and the shared movement log.
///
/// Idempotent; safe to run on every start.
#[instrument(skip_all, err)]
pub async fn ensure_schema(pool: &PgPool, registry: &BranchRegistry) -> Result<(), StoreError> {
    for handle in registry.handles() {
        let table = handle.table();
        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id            SERIAL PRIMARY KEY,
                drug_name     VARCHAR(100) NOT NULL,
                current_stock INTEGER NOT NULL CHECK (current_stock >= 0),
                threshold     INTEGER NOT NULL DEFAULT 50 CHECK (threshold >= 0),
                created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_updated  TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        );
        sqlx::query(&sql)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("create_stock_table", e))?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stock_movements (
            id            BIGSERIAL PRIMARY KEY,
            branch_key    VARCHAR(50) NOT NULL,
            drug_id       INTEGER NOT NULL,
            movement_type VARCHAR(3) NOT NULL CHECK (movement_type IN ('IN', 'OUT')),
            quantity      INTEGER NOT NULL CHECK (quantity > 0),
            occurred_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            request_id    UUID UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create_movements_table", e))?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS stock_movements_item_time_idx
            ON stock_movements (branch_key, drug_id, occurred_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| map_sqlx_error("create_movements_index", e))?;

    tracing::info!(branches = registry.branches().len(), "ledger schema ready");
    Ok(())
}

/// Close the pool, waiting for checked-out connections to be returned.
pub async fn shutdown(pool: PgPool) {
    pool.close().await;
    tracing::info!("postgres pool closed");
}
