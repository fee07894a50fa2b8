//! Packet names and the payloads they carry.

use crate::world::record::{Goodwill, WorldObjectRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Type names shared by both roles' dispatch tables
pub mod packet_names {
    pub const LOGIN: &str = "LoginPacket";
    pub const REGISTER: &str = "RegisterPacket";
    pub const LOGIN_RESPONSE: &str = "LoginResponsePacket";
    pub const PLAYER_RECOUNT: &str = "PlayerRecountPacket";
    /// Carries one snapshot part; handled by the receiving side's download
    pub const RECEIVE_SAVE_PART: &str = "ReceiveSavePartPacket";
    /// Asks the uploading side for its next part
    pub const REQUEST_SAVE_PART: &str = "RequestSavePartPacket";
    pub const SITE: &str = "SitePacket";
    pub const REJECTION: &str = "RejectionPacket";
}

/// Outcome reported by the account handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginResponse {
    Login,
    RegisterError,
    RegisterInUse,
    InvalidLogin,
    BannedLogin,
    Whitelist,
    WrongVersion,
    WrongMods,
    ExtraLogin,
}

impl LoginResponse {
    pub fn is_success(self) -> bool {
        self == LoginResponse::Login
    }
}

/// Credentials on the way in, outcome on the way out
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
    pub client_version: String,
    pub try_response: Option<LoginResponse>,
    pub extra_details: Vec<String>,
}

impl LoginData {
    pub fn credentials(
        username: impl Into<String>,
        password: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            client_version: client_version.into(),
            try_response: None,
            extra_details: Vec::new(),
        }
    }

    pub fn response(response: LoginResponse, extra_details: Vec<String>) -> Self {
        Self {
            try_response: Some(response),
            extra_details,
            ..Self::default()
        }
    }

    /// Wipe the plaintext password from memory
    pub fn clear_secret(&mut self) {
        self.password.zeroize();
    }
}

/// Why a snapshot is being transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SaveMode {
    #[default]
    Autosave,
    /// Final snapshot sent on an intentional disconnect
    Disconnect,
}

impl SaveMode {
    /// Integer-string encoding used in `additional_instructions`
    pub fn as_instruction(self) -> String {
        match self {
            SaveMode::Autosave => "0".to_string(),
            SaveMode::Disconnect => "1".to_string(),
        }
    }

    pub fn from_instruction(value: &str) -> Option<Self> {
        match value.trim() {
            "0" => Some(SaveMode::Autosave),
            "1" => Some(SaveMode::Disconnect),
            _ => None,
        }
    }
}

/// One part of a chunked snapshot transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransferData {
    /// Size of the compressed artifact being transferred
    pub file_size: i64,
    /// Total number of parts in this transfer
    pub file_parts: i32,
    pub file_bytes: Vec<u8>,
    pub is_last_part: bool,
    pub additional_instructions: String,
}

impl FileTransferData {
    pub fn save_mode(&self) -> SaveMode {
        SaveMode::from_instruction(&self.additional_instructions).unwrap_or_default()
    }
}

/// Step requested of (or reported by) the world-object authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStepMode {
    Build,
    Destroy,
    Info,
    Deposit,
    Retrieve,
    Reward,
    Accept,
}

/// World-object request or notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteData {
    pub step_mode: SiteStepMode,
    pub tile: i32,
    pub record: Option<WorldObjectRecord>,
    /// Recipient-specific standing towards the record
    pub relationship: Goodwill,
    pub reward_tiles: Vec<i32>,
}

impl SiteData {
    pub fn request(step_mode: SiteStepMode, tile: i32) -> Self {
        Self {
            step_mode,
            tile,
            record: None,
            relationship: Goodwill::Neutral,
            reward_tiles: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: WorldObjectRecord) -> Self {
        self.record = Some(record);
        self
    }

    pub fn rewards(tiles: Vec<i32>) -> Self {
        Self {
            reward_tiles: tiles,
            ..Self::request(SiteStepMode::Reward, -1)
        }
    }
}

/// Connected player listing broadcast after every login
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlayerRecountData {
    pub current_players: usize,
    pub player_names: Vec<String>,
}

/// Recoverable reason a request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectionKind {
    NoPower,
    WorkerPresent,
    NotOwner,
    FactionMismatch,
    NotInFaction,
    NotSupported,
    FeatureDisabled,
    TileInUse,
    SlotOccupied,
    SlotEmpty,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCategory {
    AuthorizationDenied,
    ResourceConflict,
}

impl RejectionKind {
    pub fn category(self) -> RejectionCategory {
        match self {
            RejectionKind::TileInUse
            | RejectionKind::SlotOccupied
            | RejectionKind::SlotEmpty
            | RejectionKind::NotFound => RejectionCategory::ResourceConflict,
            _ => RejectionCategory::AuthorizationDenied,
        }
    }
}

/// Structured rejection sent back to the requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
    pub tile: Option<i32>,
}

impl Rejection {
    pub fn new(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            tile: None,
        }
    }

    pub fn at_tile(kind: RejectionKind, tile: i32, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            tile: Some(tile),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let category = match self.kind.category() {
            RejectionCategory::AuthorizationDenied => "AuthorizationDenied",
            RejectionCategory::ResourceConflict => "ResourceConflict",
        };
        write!(f, "{category}({:?}): {}", self.kind, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_mode_instruction_encoding() {
        assert_eq!(SaveMode::Disconnect.as_instruction(), "1");
        assert_eq!(SaveMode::from_instruction("0"), Some(SaveMode::Autosave));
        assert_eq!(SaveMode::from_instruction("garbage"), None);
    }

    #[test]
    fn test_unknown_instruction_defaults_to_autosave() {
        let part = FileTransferData {
            file_size: 1,
            file_parts: 1,
            file_bytes: vec![0],
            is_last_part: true,
            additional_instructions: "7".into(),
        };
        assert_eq!(part.save_mode(), SaveMode::Autosave);
    }

    #[test]
    fn test_rejection_categories() {
        assert_eq!(
            RejectionKind::WorkerPresent.category(),
            RejectionCategory::AuthorizationDenied
        );
        assert_eq!(
            RejectionKind::SlotOccupied.category(),
            RejectionCategory::ResourceConflict
        );
    }

    #[test]
    fn test_rejection_display() {
        let rejection =
            Rejection::at_tile(RejectionKind::NotOwner, 42, "bob does not own tile 42");
        assert_eq!(
            rejection.to_string(),
            "AuthorizationDenied(NotOwner): bob does not own tile 42"
        );
    }

    #[test]
    fn test_clear_secret_wipes_password() {
        let mut login = LoginData::credentials("alice", "hunter2", "1.0");
        login.clear_secret();
        assert!(login.password.is_empty());
    }
}
