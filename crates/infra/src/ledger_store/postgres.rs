//! Postgres-backed ledger.
//!
//! Each branch owns one table (`apollo_<branch>`); all branches share the
//! `stock_movements` log. Table names are never built from caller input: they
//! come from [`StoreHandle::table`], which only yields a fixed set of static
//! identifiers.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation on `request_id`, in `append_movement`) | `23505` | `DuplicateRequest` |
//! | Database (unique violation elsewhere) | `23505` | `Constraint` |
//! | Database (check constraint violation) | `23514` | `Constraint` |
//! | Database (other) | Any other | `Other` |
//! | PoolClosed / PoolTimedOut / Io | N/A | `Unavailable` |
//! | ColumnDecode / Decode | N/A | `Decode` |
//! | Other | N/A | `Other` |
//!
//! ## Locking
//!
//! `lock_item` issues `SELECT ... FOR UPDATE`, so concurrent movements against
//! the same row serialize on the row lock while other rows stay independent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use medstock_core::{DrugId, MovementId};
use medstock_inventory::{BranchKey, Movement, MovementType, NewMovement, NewStockItem, StockItem};

use super::r#trait::{ItemOrder, LedgerStore, LedgerTransaction, MovementLog, StoreError};
use crate::registry::StoreHandle;

const ITEM_COLUMNS: &str = "id, drug_name, current_stock, threshold, created_at, last_updated";
const MOVEMENT_COLUMNS: &str = "id, branch_key, drug_id, movement_type, quantity, occurred_at, request_id";

/// Postgres-backed ledger store and movement log.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedger {
    #[instrument(skip(self), fields(table = handle.table(), order = order.as_sql()), err)]
    async fn list_items(&self, handle: &StoreHandle, order: ItemOrder) -> Result<Vec<StockItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {} ORDER BY id {}",
            handle.table(),
            order.as_sql()
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(|row| decode_item(handle, row)).collect()
    }

    #[instrument(skip(self), fields(table = handle.table(), drug_id = %drug_id), err)]
    async fn get_item(&self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM {} WHERE id = $1", handle.table());
        let row = sqlx::query(&sql)
            .bind(drug_id.get())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_item", e))?;

        row.as_ref().map(|row| decode_item(handle, row)).transpose()
    }

    #[instrument(skip(self, item), fields(table = handle.table(), drug_name = item.drug_name()), err)]
    async fn insert_item(
        &self,
        handle: &StoreHandle,
        item: NewStockItem,
        now: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO {} (drug_name, current_stock, threshold, created_at, last_updated)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING {ITEM_COLUMNS}
            "#,
            handle.table()
        );
        let row = sqlx::query(&sql)
            .bind(item.drug_name())
            .bind(item.initial_stock())
            .bind(item.threshold())
            .bind(now)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;

        decode_item(handle, &row)
    }

    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTransaction { tx }))
    }
}

#[async_trait]
impl MovementLog for PostgresLedger {
    #[instrument(skip(self), fields(branch = %branch, drug_id = %drug_id), err)]
    async fn movements_for(&self, branch: BranchKey, drug_id: DrugId) -> Result<Vec<Movement>, StoreError> {
        let sql = format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM stock_movements
            WHERE branch_key = $1 AND drug_id = $2
            ORDER BY occurred_at DESC, id DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(branch.as_str())
            .bind(drug_id.get())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("movements_for", e))?;

        let movements = rows.iter().map(decode_movement).collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(count = movements.len(), "loaded movement history");
        Ok(movements)
    }
}

struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    #[instrument(skip(self), fields(table = handle.table(), drug_id = %drug_id), err)]
    async fn lock_item(&mut self, handle: &StoreHandle, drug_id: DrugId) -> Result<Option<StockItem>, StoreError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM {} WHERE id = $1 FOR UPDATE",
            handle.table()
        );
        let row = sqlx::query(&sql)
            .bind(drug_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_item", e))?;

        row.as_ref().map(|row| decode_item(handle, row)).transpose()
    }

    async fn find_movement_by_request(&mut self, request_id: Uuid) -> Result<Option<Movement>, StoreError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements WHERE request_id = $1");
        let row = sqlx::query(&sql)
            .bind(request_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_movement_by_request", e))?;

        row.as_ref().map(decode_movement).transpose()
    }

    #[instrument(
        skip(self, movement),
        fields(
            branch = %movement.branch,
            drug_id = %movement.drug_id,
            movement_type = %movement.movement_type,
            quantity = movement.quantity.get()
        ),
        err
    )]
    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO stock_movements (branch_key, drug_id, movement_type, quantity, occurred_at, request_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(movement.branch.as_str())
        .bind(movement.drug_id.get())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity.get())
        .bind(movement.occurred_at)
        .bind(movement.request_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateRequest(
                    movement
                        .request_id
                        .map(|id| id.to_string())
                        .unwrap_or_default(),
                )
            } else {
                map_sqlx_error("append_movement", e)
            }
        })?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| StoreError::Decode(format!("movement id: {e}")))?;
        Ok(movement.into_movement(MovementId::new(id)))
    }

    #[instrument(skip(self), fields(table = handle.table(), drug_id = %drug_id), err)]
    async fn write_balance(
        &mut self,
        handle: &StoreHandle,
        drug_id: DrugId,
        current_stock: i32,
        updated_at: DateTime<Utc>,
    ) -> Result<StockItem, StoreError> {
        let sql = format!(
            r#"
            UPDATE {}
            SET current_stock = $1, last_updated = $2
            WHERE id = $3
            RETURNING {ITEM_COLUMNS}
            "#,
            handle.table()
        );
        let row = sqlx::query(&sql)
            .bind(current_stock)
            .bind(updated_at)
            .bind(drug_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("write_balance", e))?
            .ok_or_else(|| {
                StoreError::Constraint(format!("row {drug_id} vanished from {}", handle.table()))
            })?;

        decode_item(handle, &row)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

/// Map SQLx errors to `StoreError`.
///
/// Unique violations are plain constraint failures here; only `append_movement`
/// turns a duplicate `request_id` into `DuplicateRequest`.
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Constraint(msg),
                _ => StoreError::Other(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Unavailable(format!("connection pool closed in {operation}")),
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("timed out acquiring a connection in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        e @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            StoreError::Decode(format!("{operation}: {e}"))
        }
        _ => StoreError::Other(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct StockRow {
    id: i32,
    drug_name: String,
    current_stock: i32,
    threshold: i32,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StockRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StockRow {
            id: row.try_get("id")?,
            drug_name: row.try_get("drug_name")?,
            current_stock: row.try_get("current_stock")?,
            threshold: row.try_get("threshold")?,
            created_at: row.try_get("created_at")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

impl StockRow {
    fn into_item(self, branch: BranchKey) -> StockItem {
        StockItem {
            id: DrugId::new(self.id),
            branch,
            drug_name: self.drug_name,
            current_stock: self.current_stock,
            threshold: self.threshold,
            created_at: self.created_at,
            last_updated: self.last_updated,
        }
    }
}

#[derive(Debug)]
struct MovementRow {
    id: i64,
    branch_key: String,
    drug_id: i32,
    movement_type: String,
    quantity: i32,
    occurred_at: DateTime<Utc>,
    request_id: Option<Uuid>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MovementRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            branch_key: row.try_get("branch_key")?,
            drug_id: row.try_get("drug_id")?,
            movement_type: row.try_get("movement_type")?,
            quantity: row.try_get("quantity")?,
            occurred_at: row.try_get("occurred_at")?,
            request_id: row.try_get("request_id")?,
        })
    }
}

impl TryFrom<MovementRow> for Movement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let branch: BranchKey = row
            .branch_key
            .parse()
            .map_err(|e| StoreError::Decode(format!("branch_key: {e}")))?;
        let movement_type: MovementType = row
            .movement_type
            .parse()
            .map_err(|e| StoreError::Decode(format!("movement_type: {e}")))?;

        Ok(Movement {
            id: MovementId::new(row.id),
            branch,
            drug_id: DrugId::new(row.drug_id),
            movement_type,
            quantity: row.quantity,
            occurred_at: row.occurred_at,
            request_id: row.request_id,
        })
    }
}

fn decode_item(handle: &StoreHandle, row: &sqlx::postgres::PgRow) -> Result<StockItem, StoreError> {
    StockRow::from_row(row)
        .map(|r| r.into_item(handle.branch()))
        .map_err(|e| StoreError::Decode(format!("failed to deserialize stock row: {e}")))
}

fn decode_movement(row: &sqlx::postgres::PgRow) -> Result<Movement, StoreError> {
    let raw = MovementRow::from_row(row)
        .map_err(|e| StoreError::Decode(format!("failed to deserialize movement row: {e}")))?;
    Movement::try_from(raw)
}
