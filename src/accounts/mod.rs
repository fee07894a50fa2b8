//! # Accounts
//!
//! Persisted user and faction records, password hashing, and the
//! file-per-user store the handshake validates against.

pub mod password;
pub mod record;
pub mod store;

pub use record::{FactionRank, FactionRecord, UserRecord};
pub use store::UserStore;
