use crate::core::serialization::MultiFormat;
use crate::core::store::StoredRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Permission level inside a faction. `Member` carries no elevated power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum FactionRank {
    #[default]
    Member,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionRecord {
    pub name: String,
    pub members: HashMap<String, FactionRank>,
}

impl FactionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: HashMap::new(),
        }
    }

    pub fn with_member(mut self, username: impl Into<String>, rank: FactionRank) -> Self {
        self.members.insert(username.into(), rank);
        self
    }

    /// Rank of `username`; unknown members hold the lowest rank
    pub fn rank_of(&self, username: &str) -> FactionRank {
        self.members.get(username).copied().unwrap_or_default()
    }

    pub fn has_power(&self, username: &str) -> bool {
        self.rank_of(username) > FactionRank::Member
    }

    pub fn same_faction(&self, other: &FactionRecord) -> bool {
        self.name == other.name
    }
}

/// A registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub saved_ip: String,
    pub is_banned: bool,
    pub faction: Option<FactionRecord>,
}

impl UserRecord {
    pub fn faction_name(&self) -> Option<&str> {
        self.faction.as_ref().map(|f| f.name.as_str())
    }
}

impl MultiFormat for UserRecord {}

impl StoredRecord for UserRecord {
    const EXTENSION: &'static str = ".mpuser";

    fn key(&self) -> String {
        self.username.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_member_has_lowest_rank() {
        let faction = FactionRecord::new("Iron Pact").with_member("alice", FactionRank::Admin);
        assert_eq!(faction.rank_of("alice"), FactionRank::Admin);
        assert_eq!(faction.rank_of("mallory"), FactionRank::Member);
        assert!(faction.has_power("alice"));
        assert!(!faction.has_power("mallory"));
    }

    #[test]
    fn test_rank_ordering() {
        assert!(FactionRank::Admin > FactionRank::Moderator);
        assert!(FactionRank::Moderator > FactionRank::Member);
    }
}
