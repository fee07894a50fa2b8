use crate::accounts::record::UserRecord;
use crate::core::serialization::SerializationFormat;
use crate::core::store::RecordStore;
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One `.mpuser` file per account, keyed by username
#[derive(Debug, Clone)]
pub struct UserStore {
    records: RecordStore<UserRecord>,
    /// Held across the existence check and the write of a new account
    creating: Arc<Mutex<()>>,
}

impl UserStore {
    pub fn new(dir: impl Into<PathBuf>, format: SerializationFormat) -> Self {
        Self {
            records: RecordStore::new(dir, format),
            creating: Arc::new(Mutex::new(())),
        }
    }

    /// Case-insensitive lookup, used for existence checks
    pub async fn find(&self, username: &str) -> Result<Option<UserRecord>> {
        if let Some(exact) = self.records.load(username).await? {
            return Ok(Some(exact));
        }
        Ok(self
            .records
            .load_all()
            .await?
            .into_iter()
            .find(|user| user.username.eq_ignore_ascii_case(username)))
    }

    /// Persist a new account unless one already exists under any casing of
    /// its name. Returns `false` when the name is taken.
    pub async fn create(&self, user: &UserRecord) -> Result<bool> {
        let _creating = self.creating.lock().await;
        if self.find(&user.username).await?.is_some() {
            return Ok(false);
        }
        self.records.save(user).await?;
        Ok(true)
    }

    pub async fn save(&self, user: &UserRecord) -> Result<()> {
        self.records.save(user).await
    }

    pub async fn all(&self) -> Result<Vec<UserRecord>> {
        self.records.load_all().await
    }
}
