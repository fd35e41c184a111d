//! `medstock-core`: ledger foundation building blocks.
//!
//! This crate contains **pure** primitives shared by every layer (no IO, no
//! storage assumptions).

pub mod error;
pub mod id;

pub use error::{LedgerError, LedgerResult};
pub use id::{DrugId, MovementId};
