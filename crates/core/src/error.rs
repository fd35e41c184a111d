//! Ledger error model.

use thiserror::Error;

use crate::id::DrugId;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Caller-facing ledger error.
///
/// Validation failures (`UnknownBranch`, `InvalidQuantity`, `InvalidMovementType`)
/// are raised before any transaction opens. `DrugNotFound` and `InsufficientStock`
/// abort an open transaction with a full rollback. `TransactionFailure` is the only
/// retryable condition; the ledger never retries on its own.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The branch key is not part of the configured allow-list.
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// No stock item with this id exists in the branch.
    #[error("drug {drug_id} not found in branch {branch}")]
    DrugNotFound { branch: String, drug_id: DrugId },

    /// Quantity was zero/negative, or an initial stock was negative.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Drug name empty or too long.
    #[error("invalid drug name: {0}")]
    InvalidDrugName(String),

    /// Movement type outside `{IN, OUT}`.
    #[error("invalid movement type: {0}")]
    InvalidMovementType(String),

    /// An `OUT` movement would drive the balance below zero.
    #[error("insufficient stock: available {available}, requested {requested}")]
    InsufficientStock { available: i32, requested: i32 },

    /// Storage unavailable, timed out, or commit failed for infrastructure reasons.
    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A request id was reused for a different movement.
    #[error("idempotency conflict: {0}")]
    IdempotencyConflict(String),
}

impl LedgerError {
    pub fn unknown_branch(key: impl Into<String>) -> Self {
        Self::UnknownBranch(key.into())
    }

    pub fn drug_not_found(branch: impl Into<String>, drug_id: DrugId) -> Self {
        Self::DrugNotFound {
            branch: branch.into(),
            drug_id,
        }
    }

    pub fn invalid_quantity(msg: impl Into<String>) -> Self {
        Self::InvalidQuantity(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn transaction_failure(msg: impl Into<String>) -> Self {
        Self::TransactionFailure(msg.into())
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailure(_))
    }

    /// Stable machine-readable code (used in API error bodies and log fields).
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownBranch(_) => "unknown_branch",
            Self::DrugNotFound { .. } => "drug_not_found",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InvalidDrugName(_) => "invalid_drug_name",
            Self::InvalidMovementType(_) => "invalid_movement_type",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::TransactionFailure(_) => "transaction_failure",
            Self::InvalidId(_) => "invalid_id",
            Self::IdempotencyConflict(_) => "idempotency_conflict",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transaction_failures_are_retryable() {
        assert!(LedgerError::transaction_failure("pool closed").is_retryable());
        assert!(!LedgerError::unknown_branch("chennai").is_retryable());
        assert!(!LedgerError::InsufficientStock { available: 1, requested: 2 }.is_retryable());
        assert!(!LedgerError::drug_not_found("erode", DrugId::new(9)).is_retryable());
    }

    #[test]
    fn messages_name_the_offending_values() {
        let err = LedgerError::InsufficientStock {
            available: 120,
            requested: 200,
        };
        assert_eq!(err.to_string(), "insufficient stock: available 120, requested 200");

        let err = LedgerError::drug_not_found("salem", DrugId::new(7));
        assert_eq!(err.to_string(), "drug 7 not found in branch salem");
    }
}
