//! Drug inventory domain module.
//!
//! Business rules for branches, stock items and stock movements, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod branch;
pub mod item;
pub mod movement;

pub use branch::{Branch, BranchKey};
pub use item::{DEFAULT_THRESHOLD, NewStockItem, StockItem, StockStatus, classify, classify_level};
pub use movement::{Movement, MovementType, NewMovement, Quantity, net_change, next_balance};
