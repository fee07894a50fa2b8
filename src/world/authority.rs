//! Server-side owner of every world-object record.
//!
//! Mutations take the tile's lock before reading the record and hold it until
//! the result is persisted. Authorization failures come back as
//! [`ProtocolError::Rejected`]; the connection driver turns them into a
//! `RejectionPacket` for the requester.

use crate::accounts::UserRecord;
use crate::core::serialization::SerializationFormat;
use crate::core::store::RecordStore;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::{packet_names, Rejection, RejectionKind, SiteData, SiteStepMode};
use crate::session::{ConnectionRegistry, Session};
use crate::world::locks::TileLocks;
use crate::world::record::{SettlementRecord, WorldObjectRecord};
use crate::world::relationship::RelationshipPolicy;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

fn reject(kind: RejectionKind, tile: i32, reason: String) -> ProtocolError {
    ProtocolError::Rejected(Rejection::at_tile(kind, tile, reason))
}

pub struct WorldAuthority {
    sites: RecordStore<WorldObjectRecord>,
    settlements: RecordStore<SettlementRecord>,
    locks: TileLocks,
    registry: Arc<ConnectionRegistry>,
    relationship: Arc<dyn RelationshipPolicy>,
}

impl WorldAuthority {
    pub fn new(
        sites_dir: &Path,
        settlements_dir: &Path,
        format: SerializationFormat,
        registry: Arc<ConnectionRegistry>,
        relationship: Arc<dyn RelationshipPolicy>,
    ) -> Self {
        Self {
            sites: RecordStore::new(sites_dir, format),
            settlements: RecordStore::new(settlements_dir, format),
            locks: TileLocks::new(),
            registry,
            relationship,
        }
    }

    pub fn sites(&self) -> &RecordStore<WorldObjectRecord> {
        &self.sites
    }

    pub fn settlements(&self) -> &RecordStore<SettlementRecord> {
        &self.settlements
    }

    pub fn locks(&self) -> &TileLocks {
        &self.locks
    }

    /// Create a world object on a free tile.
    ///
    /// Every other connected player is told about it, each with their own
    /// standing; the requester gets an `Accept` instead.
    #[instrument(skip(self, requester), fields(session = requester.id()))]
    pub async fn build(
        &self,
        requester: &Session,
        tile: i32,
        kind: &str,
        for_faction: bool,
    ) -> Result<WorldObjectRecord> {
        let user = requester.require_user()?;
        let _guard = self.locks.lock(tile).await;

        let key = tile.to_string();
        if self.settlements.exists(&key).await? {
            return Err(reject(
                RejectionKind::TileInUse,
                tile,
                format!("tile {tile} already holds a settlement"),
            ));
        }
        if self.sites.exists(&key).await? {
            return Err(reject(
                RejectionKind::TileInUse,
                tile,
                format!("tile {tile} already holds a site"),
            ));
        }

        let faction = if for_faction {
            let faction = user.faction.clone().ok_or_else(|| {
                reject(
                    RejectionKind::NotInFaction,
                    tile,
                    format!("{} is not in a faction", user.username),
                )
            })?;
            if !faction.has_power(&user.username) {
                return Err(reject(
                    RejectionKind::NoPower,
                    tile,
                    format!("{} lacks the rank to build for {}", user.username, faction.name),
                ));
            }
            Some(faction)
        } else {
            None
        };

        let record = WorldObjectRecord {
            tile,
            owner: Some(user.username.clone()),
            faction,
            kind: kind.to_string(),
            worker_payload: None,
        };
        self.sites.save(&record).await?;

        for (session, viewer) in self.registry.authenticated() {
            if session.id() == requester.id() {
                continue;
            }
            let notice = self.notice(SiteStepMode::Build, &record, &viewer);
            if let Err(e) = session.send_payload(packet_names::SITE, &notice) {
                debug!(session = session.id(), error = %e, "Skipped closed session");
            }
        }
        let accepted = self.notice(SiteStepMode::Accept, &record, &user);
        requester.send_payload(packet_names::SITE, &accepted)?;

        info!(tile, user = %user.username, faction = ?record.faction.as_ref().map(|f| &f.name), "Created site");
        Ok(record)
    }

    /// Remove a world object and tell every connected player
    #[instrument(skip(self, requester), fields(session = requester.id()))]
    pub async fn destroy(&self, requester: &Session, tile: i32) -> Result<WorldObjectRecord> {
        let user = requester.require_user()?;
        let _guard = self.locks.lock(tile).await;
        let record = self.existing(tile).await?;

        match &record.faction {
            Some(faction) => {
                let member = user
                    .faction
                    .as_ref()
                    .filter(|own| own.same_faction(faction));
                let Some(own) = member else {
                    return Err(reject(
                        RejectionKind::FactionMismatch,
                        tile,
                        format!("{} is not a member of faction {}", user.username, faction.name),
                    ));
                };
                if !own.has_power(&user.username) {
                    return Err(reject(
                        RejectionKind::NoPower,
                        tile,
                        format!("{} lacks the rank to destroy tile {tile}", user.username),
                    ));
                }
            }
            None => {
                if !record.is_owned_by(&user.username) {
                    return Err(reject(
                        RejectionKind::NotOwner,
                        tile,
                        format!("{} does not own tile {tile}", user.username),
                    ));
                }
                if record.has_worker() {
                    return Err(reject(
                        RejectionKind::WorkerPresent,
                        tile,
                        format!("tile {tile} still has a worker inside"),
                    ));
                }
            }
        }

        self.sites.delete(&tile.to_string()).await?;
        for (session, viewer) in self.registry.authenticated() {
            let notice = self.notice(SiteStepMode::Destroy, &record, &viewer);
            if let Err(e) = session.send_payload(packet_names::SITE, &notice) {
                debug!(session = session.id(), error = %e, "Skipped closed session");
            }
        }

        warn!(tile, user = %user.username, "Removed site");
        Ok(record)
    }

    /// Send the current record, if any, to the requester
    pub async fn info(&self, requester: &Session, tile: i32) -> Result<Option<WorldObjectRecord>> {
        let user = requester.require_user()?;
        let record = self.sites.load(&tile.to_string()).await?;

        let mut reply = SiteData::request(SiteStepMode::Info, tile);
        if let Some(record) = &record {
            reply.relationship = self.relationship.goodwill(&user, record);
            reply.record = Some(record.clone());
        }
        requester.send_payload(packet_names::SITE, &reply)?;
        Ok(record)
    }

    /// Place a worker into an empty personal site
    #[instrument(skip(self, requester, payload), fields(session = requester.id()))]
    pub async fn deposit(&self, requester: &Session, tile: i32, payload: Vec<u8>) -> Result<()> {
        let user = requester.require_user()?;
        let _guard = self.locks.lock(tile).await;
        let mut record = self.existing(tile).await?;

        if record.is_faction_owned() {
            return Err(reject(
                RejectionKind::NotSupported,
                tile,
                format!("faction site at tile {tile} does not take workers"),
            ));
        }
        self.require_owner(&record, &user)?;
        if record.has_worker() {
            return Err(reject(
                RejectionKind::SlotOccupied,
                tile,
                format!("tile {tile} already has a worker"),
            ));
        }

        record.worker_payload = Some(payload);
        self.sites.save(&record).await?;
        info!(tile, user = %user.username, "Deposited worker");
        Ok(())
    }

    /// Take the worker out of a personal site and hand it back to the requester
    #[instrument(skip(self, requester), fields(session = requester.id()))]
    pub async fn retrieve(&self, requester: &Session, tile: i32) -> Result<Vec<u8>> {
        let user = requester.require_user()?;
        let _guard = self.locks.lock(tile).await;
        let mut record = self.existing(tile).await?;

        if record.is_faction_owned() {
            return Err(reject(
                RejectionKind::NotSupported,
                tile,
                format!("faction site at tile {tile} holds no workers"),
            ));
        }
        self.require_owner(&record, &user)?;
        let Some(payload) = record.worker_payload.take() else {
            return Err(reject(
                RejectionKind::SlotEmpty,
                tile,
                format!("tile {tile} has no worker"),
            ));
        };
        self.sites.save(&record).await?;

        let mut returned = record.clone();
        returned.worker_payload = Some(payload.clone());
        let reply = self.notice(SiteStepMode::Retrieve, &returned, &user);
        requester.send_payload(packet_names::SITE, &reply)?;

        info!(tile, user = %user.username, "Retrieved worker");
        Ok(payload)
    }

    /// Tell every connected player which of their sites hold a worker.
    /// Returns the number of notifications sent.
    pub async fn reward_tick(&self) -> Result<usize> {
        let sites = self.sites.load_all().await?;
        let mut sent = 0;

        for (session, user) in self.registry.authenticated() {
            let mut tiles: Vec<i32> = sites
                .iter()
                .filter(|site| site.has_worker())
                .filter(|site| match (&site.faction, user.faction_name()) {
                    (None, _) => site.is_owned_by(&user.username),
                    (Some(faction), Some(own)) => faction.name == own,
                    (Some(_), None) => false,
                })
                .map(|site| site.tile)
                .collect();
            if tiles.is_empty() {
                continue;
            }
            tiles.sort_unstable();

            match session.send_payload(packet_names::SITE, &SiteData::rewards(tiles)) {
                Ok(()) => {
                    session.metrics().reward_packet();
                    sent += 1;
                }
                Err(e) => debug!(session = session.id(), error = %e, "Skipped closed session"),
            }
        }

        info!(sites = sites.len(), notified = sent, "Site reward tick");
        Ok(sent)
    }

    async fn existing(&self, tile: i32) -> Result<WorldObjectRecord> {
        self.sites.load(&tile.to_string()).await?.ok_or_else(|| {
            reject(
                RejectionKind::NotFound,
                tile,
                format!("no site at tile {tile}"),
            )
        })
    }

    fn require_owner(&self, record: &WorldObjectRecord, user: &UserRecord) -> Result<()> {
        if record.is_owned_by(&user.username) {
            Ok(())
        } else {
            Err(reject(
                RejectionKind::NotOwner,
                record.tile,
                format!("{} does not own tile {}", user.username, record.tile),
            ))
        }
    }

    fn notice(&self, step_mode: SiteStepMode, record: &WorldObjectRecord, viewer: &UserRecord) -> SiteData {
        let mut data = SiteData::request(step_mode, record.tile).with_record(record.clone());
        data.relationship = self.relationship.goodwill(viewer, record);
        data
    }
}

impl std::fmt::Debug for WorldAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldAuthority")
            .field("sites", &self.sites.dir())
            .field("settlements", &self.settlements.dir())
            .field("locked_tiles", &self.locks.len())
            .finish()
    }
}
