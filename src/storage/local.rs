use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::{
    errors::{AppError, Result},
    models::User,
    storage::{CredentialStore, StoredCredentials},
};

/// On-disk layout. Both keys are optional so a partial record can be detected.
#[derive(Serialize, Deserialize, Default)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_data: Option<User>,
}

/// Keeps the session in a single JSON file so token and profile change atomically.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<StoredCredentials>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to read credentials file: {}",
                    e
                )))
            }
        };

        let file: CredentialFile = serde_json::from_slice(&raw)?;
        match (file.access_token, file.user_data) {
            (Some(access_token), Some(user_data)) if !access_token.is_empty() => {
                Ok(Some(StoredCredentials { access_token, user_data }))
            }
            _ => {
                warn!(path = %self.path.display(), "Ignoring partial credentials record");
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    AppError::Storage(format!("Failed to create credentials directory: {}", e))
                })?;
            }
        }

        let file = CredentialFile {
            access_token: Some(credentials.access_token.clone()),
            user_data: Some(credentials.user_data.clone()),
        };
        let encoded = serde_json::to_vec_pretty(&file)?;

        let staging = self.staging_path();
        fs::write(&staging, encoded)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write credentials: {}", e)))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to persist credentials: {}", e)))?;

        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to clear credentials: {}",
                e
            ))),
        }
    }
}
