use crate::accounts::FactionRecord;
use crate::core::serialization::MultiFormat;
use crate::core::store::StoredRecord;
use serde::{Deserialize, Serialize};

/// Standing of a viewer towards a world object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Goodwill {
    Enemy,
    #[default]
    Neutral,
    Ally,
    Faction,
    Personal,
}

/// A player- or faction-owned outpost on one tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldObjectRecord {
    pub tile: i32,
    /// Builder of the object. Ignored for authorization when `faction` is set.
    pub owner: Option<String>,
    pub faction: Option<FactionRecord>,
    pub kind: String,
    pub worker_payload: Option<Vec<u8>>,
}

impl WorldObjectRecord {
    pub fn personal(tile: i32, owner: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            tile,
            owner: Some(owner.into()),
            faction: None,
            kind: kind.into(),
            worker_payload: None,
        }
    }

    /// A record as a client sends it: the server fills in ownership
    pub fn request(tile: i32, kind: impl Into<String>) -> Self {
        Self {
            owner: None,
            ..Self::personal(tile, String::new(), kind)
        }
    }

    pub fn is_faction_owned(&self) -> bool {
        self.faction.is_some()
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owner.as_deref() == Some(username)
    }

    pub fn has_worker(&self) -> bool {
        self.worker_payload.is_some()
    }

    pub fn belongs_to_faction(&self, name: &str) -> bool {
        self.faction.as_ref().is_some_and(|f| f.name == name)
    }
}

impl MultiFormat for WorldObjectRecord {}

impl StoredRecord for WorldObjectRecord {
    const EXTENSION: &'static str = ".mpsite";

    fn key(&self) -> String {
        self.tile.to_string()
    }
}

/// A player settlement. Only its tile matters here: settlements and outposts
/// never share a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub tile: i32,
    pub owner: String,
}

impl MultiFormat for SettlementRecord {}

impl StoredRecord for SettlementRecord {
    const EXTENSION: &'static str = ".mpsettlement";

    fn key(&self) -> String {
        self.tile.to_string()
    }
}
