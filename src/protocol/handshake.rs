//! Account handshake: registration and login validation.
//!
//! Checks run in a fixed order and the first failure decides the response:
//!
//! 1. client version matches the server version
//! 2. credential shape (non-blank, no whitespace in the name, length limits)
//! 3. existence, compared case-insensitively
//! 4. authentication, exact username and password digest
//! 5. saved IP refresh
//! 6. ban
//! 7. whitelist
//!
//! Duplicate-session eviction happens afterwards, in the server handler, since
//! it needs the connection registry.

use crate::accounts::password::{generate_salt, hash_password, verify_password};
use crate::accounts::{UserRecord, UserStore};
use crate::config::AccessConfig;
use crate::protocol::message::{LoginData, LoginResponse};
use tracing::{debug, info, warn};

/// Which handshake packet started the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeKind {
    Login,
    Register,
}

impl HandshakeKind {
    fn shape_failure(self) -> LoginResponse {
        match self {
            HandshakeKind::Login => LoginResponse::InvalidLogin,
            HandshakeKind::Register => LoginResponse::RegisterError,
        }
    }
}

/// Failed handshake outcome, sent back in a `LoginResponsePacket`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRefusal {
    pub response: LoginResponse,
    pub details: Vec<String>,
}

impl LoginRefusal {
    fn new(response: LoginResponse) -> Self {
        Self {
            response,
            details: Vec::new(),
        }
    }

    pub fn into_login_data(self) -> LoginData {
        LoginData::response(self.response, self.details)
    }
}

pub type HandshakeResult = std::result::Result<UserRecord, LoginRefusal>;

pub struct AccountHandshake<'a> {
    access: &'a AccessConfig,
    users: &'a UserStore,
}

impl<'a> AccountHandshake<'a> {
    pub fn new(access: &'a AccessConfig, users: &'a UserStore) -> Self {
        Self { access, users }
    }

    pub async fn login(&self, data: &LoginData, peer_ip: &str) -> HandshakeResult {
        self.check_version(data)?;
        self.check_shape(data, HandshakeKind::Login)?;

        let existing = match self.users.find(&data.username).await {
            Ok(found) => found,
            Err(e) => {
                warn!(user = %data.username, error = %e, "User lookup failed");
                None
            }
        };
        let Some(user) = existing else {
            debug!(user = %data.username, "Login for unknown user");
            return Err(LoginRefusal::new(LoginResponse::InvalidLogin));
        };

        if user.username != data.username
            || !verify_password(&data.password, &user.salt, &user.password_hash)
        {
            debug!(user = %data.username, "Credentials did not match");
            return Err(LoginRefusal::new(LoginResponse::InvalidLogin));
        }

        self.admit(user, peer_ip).await
    }

    /// Create the account, then continue exactly like a login
    pub async fn register(&self, data: &LoginData, peer_ip: &str) -> HandshakeResult {
        self.check_version(data)?;
        self.check_shape(data, HandshakeKind::Register)?;

        let salt = generate_salt();
        let user = UserRecord {
            username: data.username.clone(),
            password_hash: hash_password(&data.password, &salt),
            salt,
            saved_ip: peer_ip.to_string(),
            is_banned: false,
            faction: None,
        };
        match self.users.create(&user).await {
            Ok(true) => {}
            Ok(false) => return Err(LoginRefusal::new(LoginResponse::RegisterInUse)),
            Err(e) => {
                warn!(user = %user.username, error = %e, "Could not persist new user");
                return Err(LoginRefusal::new(LoginResponse::RegisterError));
            }
        }
        info!(user = %user.username, "Registered new user");

        self.admit(user, peer_ip).await
    }

    async fn admit(&self, mut user: UserRecord, peer_ip: &str) -> HandshakeResult {
        if user.saved_ip != peer_ip {
            user.saved_ip = peer_ip.to_string();
            if let Err(e) = self.users.save(&user).await {
                warn!(user = %user.username, error = %e, "Could not refresh saved IP");
            }
        }

        if user.is_banned {
            return Err(LoginRefusal::new(LoginResponse::BannedLogin));
        }
        if self.access.use_whitelist
            && !self
                .access
                .whitelisted_users
                .iter()
                .any(|name| name == &user.username)
        {
            return Err(LoginRefusal::new(LoginResponse::Whitelist));
        }

        Ok(user)
    }

    fn check_version(&self, data: &LoginData) -> std::result::Result<(), LoginRefusal> {
        if data.client_version == self.access.server_version {
            return Ok(());
        }
        Err(LoginRefusal {
            response: LoginResponse::WrongVersion,
            details: vec![self.access.server_version.clone()],
        })
    }

    fn check_shape(&self, data: &LoginData, kind: HandshakeKind) -> std::result::Result<(), LoginRefusal> {
        if credentials_are_well_formed(data, self.access) {
            Ok(())
        } else {
            Err(LoginRefusal::new(kind.shape_failure()))
        }
    }
}

/// Usernames double as file names, so path separators and a leading dot
/// are refused alongside whitespace.
pub fn credentials_are_well_formed(data: &LoginData, access: &AccessConfig) -> bool {
    let name = data.username.as_str();
    let password = data.password.as_str();

    !name.trim().is_empty()
        && !password.trim().is_empty()
        && !name.chars().any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | ':'))
        && !name.starts_with('.')
        && name.chars().count() <= access.max_username_len
        && password.chars().count() <= access.max_password_len
}
