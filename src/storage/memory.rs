use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    errors::Result,
    storage::{CredentialStore, StoredCredentials},
};

/// Process-local store, handy for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<StoredCredentials>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: StoredCredentials) -> Self {
        Self {
            slot: Mutex::new(Some(credentials)),
        }
    }

    pub fn snapshot(&self) -> Option<StoredCredentials> {
        self.slot.lock().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        *self.slot.lock() = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().take();
        Ok(())
    }
}
