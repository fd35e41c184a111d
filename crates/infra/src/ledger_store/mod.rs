//! Ledger storage boundary.
//!
//! Per-branch stock tables plus one shared, append-only movement log, behind
//! traits with an in-memory backend (tests/dev) and a Postgres backend.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use r#trait::{
    ItemOrder, LedgerBackend, LedgerStore, LedgerTransaction, MovementLog, StoreError,
};
