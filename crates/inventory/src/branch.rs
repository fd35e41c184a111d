//! Hospital branches: a closed set of inventory partitions.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use medstock_core::LedgerError;

/// Logical branch identifier.
///
/// Closed enumeration: a branch key can only be obtained by parsing against
/// the known variants, so free-form caller input never names a storage target.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchKey {
    Namakkal,
    Erode,
    Kovai,
    Salem,
}

impl BranchKey {
    pub const ALL: [BranchKey; 4] = [
        BranchKey::Namakkal,
        BranchKey::Erode,
        BranchKey::Kovai,
        BranchKey::Salem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BranchKey::Namakkal => "namakkal",
            BranchKey::Erode => "erode",
            BranchKey::Kovai => "kovai",
            BranchKey::Salem => "salem",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            BranchKey::Namakkal => "Namakkal",
            BranchKey::Erode => "Erode",
            BranchKey::Kovai => "Kovai",
            BranchKey::Salem => "Salem",
        }
    }

    /// Physical stock table backing this branch.
    pub fn table_name(self) -> &'static str {
        match self {
            BranchKey::Namakkal => "apollo_namakkal",
            BranchKey::Erode => "apollo_erode",
            BranchKey::Kovai => "apollo_kovai",
            BranchKey::Salem => "apollo_salem",
        }
    }
}

impl core::fmt::Display for BranchKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BranchKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BranchKey::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LedgerError::unknown_branch(wanted))
    }
}

/// A configured branch (immutable after startup).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub key: BranchKey,
    pub display_name: String,
}

impl From<BranchKey> for Branch {
    fn from(key: BranchKey) -> Self {
        Self {
            key,
            display_name: key.display_name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys_case_insensitively() {
        assert_eq!("erode".parse::<BranchKey>().unwrap(), BranchKey::Erode);
        assert_eq!(" Kovai ".parse::<BranchKey>().unwrap(), BranchKey::Kovai);
    }

    #[test]
    fn rejects_anything_outside_the_closed_set() {
        for raw in ["", "chennai", "apollo_salem", "salem; DROP TABLE apollo_salem", "erode--"] {
            match raw.parse::<BranchKey>() {
                Err(LedgerError::UnknownBranch(_)) => {}
                other => panic!("expected UnknownBranch for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn table_names_are_distinct() {
        let mut names: Vec<_> = BranchKey::ALL.iter().map(|k| k.table_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), BranchKey::ALL.len());
    }
}
