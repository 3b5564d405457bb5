use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OutfitInputs, Role};

/// One stored generation request as listed by `GET /api/admin/requests`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutfitRequestRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub inputs: OutfitInputs,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub image_filename: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_requests: u64,
    #[serde(default)]
    pub today_requests: u64,
    #[serde(default)]
    pub generated_images_count: u64,
    #[serde(default)]
    pub atmosphere_stats: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_limit_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_used_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.images_limit_total.is_none()
            && self.images_used_total.is_none()
            && self.is_active.is_none()
    }
}
