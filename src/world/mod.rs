//! # World Objects
//!
//! Tile-keyed outposts owned by a player or a faction, arbitrated by a single
//! [`WorldAuthority`].
//!
//! ## Components
//! - **Record**: persisted site and settlement records, viewer standing
//! - **Locks**: per-tile mutual exclusion for read-modify-persist
//! - **Authority**: build, destroy, info, deposit, retrieve, reward tick
//! - **Relationship**: per-recipient standing computed for broadcasts
//! - **Ticker**: cancellable periodic reward schedule

pub mod authority;
pub mod locks;
pub mod record;
pub mod relationship;
pub mod ticker;

pub use authority::WorldAuthority;
pub use locks::{TileGuard, TileLocks};
pub use record::{Goodwill, SettlementRecord, WorldObjectRecord};
pub use relationship::{OwnershipRelationship, RelationshipPolicy};
pub use ticker::spawn_reward_ticker;
