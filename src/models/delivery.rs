use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub body: String,
}

impl Default for EmailTemplate {
    fn default() -> Self {
        Self {
            subject: "Your Custom Groom Outfit Visualization".to_string(),
            body: "Dear Customer,\n\nThank you for using our groom outfit visualization service!\n\n\
                   Please find your generated outfit visualizations attached.\n\n\
                   Best regards,\nTailorView Team"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SendMultipleRequest {
    pub email: String,
    #[serde(rename = "imageIds")]
    pub image_ids: Vec<Uuid>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMultipleResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// A delivery the server could not complete and parked for retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailQueueItem {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub outfit_details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailQueueResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub queue: Vec<EmailQueueItem>,
}
