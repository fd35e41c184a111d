//! Infrastructure layer: branch routing, ledger storage, transactions, config.

pub mod catalog;
pub mod config;
pub mod db;
pub mod history;
pub mod ledger_store;
pub mod recorder;
pub mod registry;
pub mod service;


pub use catalog::StockCatalog;
pub use config::{BackendKind, ConfigError, DatabaseConfig, LedgerConfig};
pub use history::HistoryReader;
pub use ledger_store::{
    InMemoryLedger, ItemOrder, LedgerBackend, LedgerStore, LedgerTransaction, MovementLog,
    PostgresLedger, StoreError,
};
pub use recorder::{MovementReceipt, MovementRecorder, MovementRequest};
pub use registry::{BranchRegistry, StoreHandle};
pub use service::LedgerService;
