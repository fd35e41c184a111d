//! Strongly-typed identifiers used across the ledger.
//!
//! Ids are database serials: unique within their table, not globally.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Identifier of a stock item, unique within one branch's stock table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugId(i32);

/// Identifier of a movement in the shared movement log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(i64);

macro_rules! impl_serial_newtype {
    ($t:ty, $inner:ty, $name:literal) => {
        impl $t {
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<$inner> for $t {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$t> for $inner {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = <$inner>::from_str(s.trim())
                    .map_err(|e| LedgerError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_serial_newtype!(DrugId, i32, "DrugId");
impl_serial_newtype!(MovementId, i64, "MovementId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays_serials() {
        let id: DrugId = " 42 ".parse().unwrap();
        assert_eq!(id, DrugId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<DrugId>().is_err());
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&MovementId::new(5)).unwrap();
        assert_eq!(json, "5");
    }
}
