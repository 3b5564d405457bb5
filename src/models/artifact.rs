use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{GenerateResponse, ImageSlot, OutfitInputs, ReferenceImages};

/// Fingerprint of a reference image; the bytes themselves are not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDigest {
    pub slot: ImageSlot,
    pub filename: String,
    pub sha256: String,
}

/// What the user asked for, frozen at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputsSnapshot {
    pub outfit: OutfitInputs,
    pub references: Vec<ReferenceDigest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
}

impl InputsSnapshot {
    pub fn capture(outfit: &OutfitInputs, images: &ReferenceImages) -> Self {
        Self {
            outfit: outfit.clone(),
            references: images
                .iter()
                .map(|(slot, upload)| ReferenceDigest {
                    slot,
                    filename: upload.filename.clone(),
                    sha256: upload.sha256(),
                })
                .collect(),
            modification: None,
            parent: None,
        }
    }

    /// Snapshot for a modification of `parent`, inheriting its inputs.
    pub fn derived(parent: &GeneratedArtifact, modification: &str) -> Self {
        Self {
            outfit: parent.inputs.outfit.clone(),
            references: parent.inputs.references.clone(),
            modification: Some(modification.to_string()),
            parent: Some(parent.request_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub request_id: Uuid,
    pub download_ref: String,
    pub filename: String,
    pub inputs: InputsSnapshot,
    pub created_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    pub fn from_response(response: &GenerateResponse, inputs: InputsSnapshot) -> Self {
        Self {
            request_id: response.request_id,
            download_ref: response.download_url.clone(),
            filename: response.image_filename.clone(),
            inputs,
            created_at: Utc::now(),
        }
    }
}
