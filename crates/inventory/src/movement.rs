use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use medstock_core::{DrugId, LedgerError, LedgerResult, MovementId};

use crate::branch::BranchKey;

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(MovementType::In),
            "OUT" => Ok(MovementType::Out),
            other => Err(LedgerError::InvalidMovementType(format!(
                "expected IN or OUT, got {other:?}"
            ))),
        }
    }
}

/// Strictly positive movement quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    pub fn new(value: i32) -> LedgerResult<Self> {
        if value <= 0 {
            return Err(LedgerError::invalid_quantity(format!(
                "quantity must be positive (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

/// Balance after applying one movement to `current`.
///
/// `OUT` below zero fails with `InsufficientStock`; `IN` past `i32::MAX` fails
/// with `InvalidQuantity`.
pub fn next_balance(current: i32, movement_type: MovementType, quantity: Quantity) -> LedgerResult<i32> {
    match movement_type {
        MovementType::In => current.checked_add(quantity.get()).ok_or_else(|| {
            LedgerError::invalid_quantity(format!(
                "stock of {current} cannot absorb {} more units",
                quantity.get()
            ))
        }),
        MovementType::Out => {
            let candidate = i64::from(current) - i64::from(quantity.get());
            if candidate < 0 {
                return Err(LedgerError::InsufficientStock {
                    available: current,
                    requested: quantity.get(),
                });
            }
            // candidate lies in 0..=current, which always fits.
            Ok(current - quantity.get())
        }
    }
}

/// Committed, immutable movement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub branch: BranchKey,
    pub drug_id: DrugId,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub occurred_at: DateTime<Utc>,
    /// Client-supplied idempotency key, when one was given.
    pub request_id: Option<Uuid>,
}

impl Movement {
    /// Signed effect on the balance.
    pub fn signed_quantity(&self) -> i64 {
        match self.movement_type {
            MovementType::In => i64::from(self.quantity),
            MovementType::Out => -i64::from(self.quantity),
        }
    }
}

/// Net balance change over a set of movements (IN minus OUT).
pub fn net_change<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> i64 {
    movements.into_iter().map(Movement::signed_quantity).sum()
}

/// A movement that has been validated but not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub branch: BranchKey,
    pub drug_id: DrugId,
    pub movement_type: MovementType,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
    pub request_id: Option<Uuid>,
}

impl NewMovement {
    pub fn into_movement(self, id: MovementId) -> Movement {
        Movement {
            id,
            branch: self.branch,
            drug_id: self.drug_id,
            movement_type: self.movement_type,
            quantity: self.quantity.get(),
            occurred_at: self.occurred_at,
            request_id: self.request_id,
        }
    }

    /// Whether an already-committed movement describes the same stock effect.
    pub fn matches(&self, existing: &Movement) -> bool {
        existing.branch == self.branch
            && existing.drug_id == self.drug_id
            && existing.movement_type == self.movement_type
            && existing.quantity == self.quantity.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn qty(v: i32) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn movement(id: i64, movement_type: MovementType, quantity: i32) -> Movement {
        Movement {
            id: MovementId::new(id),
            branch: BranchKey::Namakkal,
            drug_id: DrugId::new(1),
            movement_type,
            quantity,
            occurred_at: Utc::now(),
            request_id: None,
        }
    }

    #[test]
    fn quantity_must_be_positive() {
        assert!(Quantity::new(1).is_ok());
        assert!(matches!(Quantity::new(0), Err(LedgerError::InvalidQuantity(_))));
        assert!(matches!(Quantity::new(-3), Err(LedgerError::InvalidQuantity(_))));
    }

    #[test]
    fn parses_movement_types() {
        assert_eq!("IN".parse::<MovementType>().unwrap(), MovementType::In);
        assert_eq!(" out ".parse::<MovementType>().unwrap(), MovementType::Out);
        assert!(matches!(
            "TRANSFER".parse::<MovementType>(),
            Err(LedgerError::InvalidMovementType(_))
        ));
    }

    #[test]
    fn movement_type_wire_format_is_uppercase() {
        assert_eq!(serde_json::to_string(&MovementType::Out).unwrap(), "\"OUT\"");
        let parsed: MovementType = serde_json::from_str("\"IN\"").unwrap();
        assert_eq!(parsed, MovementType::In);
    }

    #[test]
    fn out_cannot_go_negative() {
        assert_eq!(next_balance(120, MovementType::Out, qty(120)).unwrap(), 0);
        assert_eq!(
            next_balance(120, MovementType::Out, qty(200)),
            Err(LedgerError::InsufficientStock {
                available: 120,
                requested: 200
            })
        );
    }

    #[test]
    fn in_overflow_is_rejected() {
        assert!(matches!(
            next_balance(i32::MAX, MovementType::In, qty(1)),
            Err(LedgerError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn matches_ignores_ids_and_timestamps() {
        let new = NewMovement {
            branch: BranchKey::Namakkal,
            drug_id: DrugId::new(1),
            movement_type: MovementType::In,
            quantity: qty(50),
            occurred_at: Utc::now(),
            request_id: Some(Uuid::now_v7()),
        };
        assert!(new.matches(&movement(9, MovementType::In, 50)));
        assert!(!new.matches(&movement(9, MovementType::Out, 50)));
        assert!(!new.matches(&movement(9, MovementType::In, 51)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: applying any sequence of movements (skipping rejected ones) keeps
        /// the balance non-negative and equal to baseline + accepted IN - accepted OUT.
        #[test]
        fn balance_equals_baseline_plus_net_of_accepted_movements(
            baseline in 0i32..10_000,
            steps in prop::collection::vec((any::<bool>(), 1i32..500), 0..64)
        ) {
            let mut balance = baseline;
            let mut accepted = Vec::new();

            for (idx, (is_in, quantity)) in steps.into_iter().enumerate() {
                let movement_type = if is_in { MovementType::In } else { MovementType::Out };
                match next_balance(balance, movement_type, qty(quantity)) {
                    Ok(next) => {
                        balance = next;
                        accepted.push(movement(idx as i64 + 1, movement_type, quantity));
                    }
                    Err(LedgerError::InsufficientStock { available, requested }) => {
                        prop_assert_eq!(available, balance);
                        prop_assert!(requested > available);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
                prop_assert!(balance >= 0);
            }

            prop_assert_eq!(i64::from(balance), i64::from(baseline) + net_change(&accepted));
        }
    }
}
