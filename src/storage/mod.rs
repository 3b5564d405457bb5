use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::errors::Result;
use crate::models::User;

#[cfg(test)]
use mockall::automock;

pub mod local;
pub mod memory;

pub use local::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// The two durable session fields, always written and cleared together.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub user_data: User,
}

impl StoredCredentials {
    pub fn new(access_token: impl Into<String>, user_data: User) -> Self {
        Self {
            access_token: access_token.into(),
            user_data,
        }
    }
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &"<redacted>")
            .field("user_data", &self.user_data)
            .finish()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns `None` when nothing usable is stored, including a half-written record.
    async fn load(&self) -> Result<Option<StoredCredentials>>;

    async fn save(&self, credentials: &StoredCredentials) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

pub fn create_store(config: &Config) -> Arc<dyn CredentialStore> {
    Arc::new(FileCredentialStore::new(&config.credentials_path))
}
