use crate::accounts::UserRecord;
use crate::world::record::{Goodwill, WorldObjectRecord};

/// Computes how a viewer regards a world object. Evaluated per recipient.
pub trait RelationshipPolicy: Send + Sync {
    fn goodwill(&self, viewer: &UserRecord, record: &WorldObjectRecord) -> Goodwill;
}

/// Ownership-only standing: own objects are `Personal`, objects of the
/// viewer's faction are `Faction`, everything else is `Neutral`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnershipRelationship;

impl RelationshipPolicy for OwnershipRelationship {
    fn goodwill(&self, viewer: &UserRecord, record: &WorldObjectRecord) -> Goodwill {
        if let Some(faction) = &record.faction {
            if viewer.faction_name() == Some(faction.name.as_str()) {
                return Goodwill::Faction;
            }
        } else if record.is_owned_by(&viewer.username) {
            return Goodwill::Personal;
        }
        Goodwill::Neutral
    }
}
