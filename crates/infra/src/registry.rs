//! Branch routing: logical branch key → physical store handle.
//!
//! The registry is the only way to obtain a [`StoreHandle`], and storage
//! backends only accept handles. Raw caller input is parsed against the closed
//! [`BranchKey`] set and then checked against the allow-list configured at
//! startup; nothing outside it ever reaches query construction.

use medstock_core::{LedgerError, LedgerResult};
use medstock_inventory::{Branch, BranchKey};

/// Resolved, validated reference to one branch's stock table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StoreHandle {
    branch: BranchKey,
}

impl StoreHandle {
    pub fn branch(&self) -> BranchKey {
        self.branch
    }

    /// Physical table name. Always one of a fixed set of static identifiers.
    pub fn table(&self) -> &'static str {
        self.branch.table_name()
    }
}

/// Allow-list of branches, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRegistry {
    branches: Vec<Branch>,
}

impl BranchRegistry {
    /// Build a registry from the enabled branches (duplicates ignored, order kept).
    pub fn new(keys: impl IntoIterator<Item = BranchKey>) -> Self {
        let mut branches: Vec<Branch> = Vec::new();
        for key in keys {
            if !branches.iter().any(|b| b.key == key) {
                branches.push(Branch::from(key));
            }
        }
        Self { branches }
    }

    /// Registry with every known branch enabled.
    pub fn all() -> Self {
        Self::new(BranchKey::ALL)
    }

    /// Resolve untrusted input. Never touches storage and never blocks.
    pub fn resolve(&self, raw: &str) -> LedgerResult<StoreHandle> {
        let key: BranchKey = raw.parse()?;
        self.resolve_key(key)
    }

    pub fn resolve_key(&self, key: BranchKey) -> LedgerResult<StoreHandle> {
        if self.branches.iter().any(|b| b.key == key) {
            Ok(StoreHandle { branch: key })
        } else {
            Err(LedgerError::unknown_branch(key.as_str()))
        }
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Handles for every enabled branch, in registry order.
    pub fn handles(&self) -> impl Iterator<Item = StoreHandle> + '_ {
        self.branches.iter().map(|b| StoreHandle { branch: b.key })
    }
}

impl Default for BranchRegistry {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_enabled_branches_to_their_tables() {
        let registry = BranchRegistry::all();
        let handle = registry.resolve("Erode").unwrap();
        assert_eq!(handle.branch(), BranchKey::Erode);
        assert_eq!(handle.table(), "apollo_erode");
    }

    #[test]
    fn disabled_branch_is_unknown() {
        let registry = BranchRegistry::new([BranchKey::Salem]);
        assert!(registry.resolve("salem").is_ok());
        assert_eq!(
            registry.resolve("kovai"),
            Err(LedgerError::UnknownBranch("kovai".to_string()))
        );
    }

    #[test]
    fn table_interpolation_attempts_are_rejected() {
        let registry = BranchRegistry::all();
        for raw in ["apollo_erode", "erode WHERE 1=1", "erode; --", "../salem"] {
            assert!(matches!(registry.resolve(raw), Err(LedgerError::UnknownBranch(_))));
        }
    }

    #[test]
    fn duplicates_are_collapsed_in_order() {
        let registry = BranchRegistry::new([BranchKey::Kovai, BranchKey::Erode, BranchKey::Kovai]);
        let keys: Vec<_> = registry.handles().map(|h| h.branch()).collect();
        assert_eq!(keys, vec![BranchKey::Kovai, BranchKey::Erode]);
        assert_eq!(registry.branches()[0].display_name, "Kovai");
    }
}
