use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{models::CreditSnapshot, utils::crypto};

/// Categorical selections and free-text overrides for one outfit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitInputs {
    pub atmosphere: String,
    pub suit_type: String,
    pub lapel_type: String,
    pub pocket_type: String,
    pub shoe_type: String,
    pub accessory_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fabric_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_shoe_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_accessory_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl OutfitInputs {
    fn categorical(&self) -> [(&'static str, &str); 6] {
        [
            ("atmosphere", self.atmosphere.as_str()),
            ("suit_type", self.suit_type.as_str()),
            ("lapel_type", self.lapel_type.as_str()),
            ("pocket_type", self.pocket_type.as_str()),
            ("shoe_type", self.shoe_type.as_str()),
            ("accessory_type", self.accessory_type.as_str()),
        ]
    }

    /// Names of the mandatory categorical fields that are still blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.categorical()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Selections that the server's option catalog does not offer.
    pub fn check_against(&self, options: &OutfitOptions) -> Vec<&'static str> {
        let offered = [
            &options.atmospheres,
            &options.suit_types,
            &options.lapel_types,
            &options.pocket_types,
            &options.shoe_types,
            &options.accessory_types,
        ];

        self.categorical()
            .into_iter()
            .zip(offered)
            .filter(|((_, value), choices)| !choices.iter().any(|choice| choice.as_str() == *value))
            .map(|((name, _), _)| name)
            .collect()
    }

    pub fn recipient(&self) -> Option<&str> {
        non_blank(&self.email)
    }

    /// Text form fields, skipping optional values that are blank.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields: Vec<(&'static str, String)> = self
            .categorical()
            .into_iter()
            .map(|(name, value)| (name, value.trim().to_string()))
            .collect();

        let optional = [
            ("fabric_description", &self.fabric_description),
            ("custom_shoe_description", &self.custom_shoe_description),
            ("custom_accessory_description", &self.custom_accessory_description),
            ("email", &self.email),
        ];
        for (name, value) in optional {
            if let Some(value) = non_blank(value) {
                fields.push((name, value.to_string()));
            }
        }

        fields
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Choices served by `GET /api/options`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutfitOptions {
    #[serde(default)]
    pub atmospheres: Vec<String>,
    #[serde(default)]
    pub suit_types: Vec<String>,
    #[serde(default)]
    pub lapel_types: Vec<String>,
    #[serde(default)]
    pub pocket_types: Vec<String>,
    #[serde(default)]
    pub shoe_types: Vec<String>,
    #[serde(default)]
    pub accessory_types: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSlot {
    Model,
    Fabric,
    Shoe,
    Accessory,
}

impl ImageSlot {
    pub fn field_name(&self) -> &'static str {
        match self {
            ImageSlot::Model => "model_image",
            ImageSlot::Fabric => "fabric_image",
            ImageSlot::Shoe => "shoe_image",
            ImageSlot::Accessory => "accessory_image",
        }
    }
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl ImageUpload {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .parse::<mime::Mime>()
            .map(|m| m.type_() == mime::IMAGE)
            .unwrap_or(false)
    }

    pub fn sha256(&self) -> String {
        crypto::calculate_sha256(&self.data)
    }
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceImages {
    pub model: Option<ImageUpload>,
    pub fabric: Option<ImageUpload>,
    pub shoe: Option<ImageUpload>,
    pub accessory: Option<ImageUpload>,
}

impl ReferenceImages {
    pub fn with_model(model: ImageUpload) -> Self {
        Self {
            model: Some(model),
            ..Default::default()
        }
    }

    /// Present uploads in submission order, model first.
    pub fn iter(&self) -> impl Iterator<Item = (ImageSlot, &ImageUpload)> {
        [
            (ImageSlot::Model, self.model.as_ref()),
            (ImageSlot::Fabric, self.fabric.as_ref()),
            (ImageSlot::Shoe, self.shoe.as_ref()),
            (ImageSlot::Accessory, self.accessory.as_ref()),
        ]
        .into_iter()
        .filter_map(|(slot, upload)| upload.map(|upload| (slot, upload)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    pub request_id: Uuid,
    pub image_filename: String,
    pub download_url: String,
    #[serde(default)]
    pub email_sent: Option<bool>,
    #[serde(default)]
    pub user_credits: Option<CreditSnapshot>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct ModifyImageRequest {
    pub request_id: Uuid,
    pub modification_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_inputs() -> OutfitInputs {
        OutfitInputs {
            atmosphere: "rustic".to_string(),
            suit_type: "2-piece suit".to_string(),
            lapel_type: "Standard notch lapel".to_string(),
            pocket_type: "Slanted, no flaps".to_string(),
            shoe_type: "Black loafers".to_string(),
            accessory_type: "Tie".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_fields() {
        let mut inputs = complete_inputs();
        assert!(inputs.missing_fields().is_empty());

        inputs.lapel_type = "  ".to_string();
        inputs.shoe_type.clear();
        assert_eq!(inputs.missing_fields(), vec!["lapel_type", "shoe_type"]);
    }

    #[test]
    fn test_form_fields_skip_blank_optionals() {
        let mut inputs = complete_inputs();
        inputs.fabric_description = Some("eucalyptus green wool".to_string());
        inputs.custom_shoe_description = Some("   ".to_string());
        inputs.email = Some(String::new());

        let fields = inputs.form_fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();

        assert_eq!(names.len(), 7);
        assert!(names.contains(&"fabric_description"));
        assert!(!names.contains(&"custom_shoe_description"));
        assert!(!names.contains(&"email"));
        assert_eq!(inputs.recipient(), None);
    }

    #[test]
    fn test_check_against_catalog() {
        let options = OutfitOptions {
            atmospheres: vec!["rustic".to_string(), "seaside".to_string()],
            suit_types: vec!["2-piece suit".to_string()],
            lapel_types: vec!["Standard notch lapel".to_string()],
            pocket_types: vec!["Slanted, no flaps".to_string()],
            shoe_types: vec!["Brown loafers".to_string()],
            accessory_types: vec!["Tie".to_string()],
        };

        assert_eq!(complete_inputs().check_against(&options), vec!["shoe_type"]);
    }

    #[test]
    fn test_image_upload_type_check() {
        assert!(ImageUpload::new("model.jpg", "image/jpeg", vec![1, 2, 3]).is_image());
        assert!(!ImageUpload::new("notes.txt", "text/plain", vec![1]).is_image());
        assert!(!ImageUpload::new("blob", "garbage", vec![1]).is_image());
    }

    #[test]
    fn test_reference_iteration_order() {
        let mut images = ReferenceImages::with_model(ImageUpload::new("m.png", "image/png", vec![0]));
        images.accessory = Some(ImageUpload::new("a.png", "image/png", vec![1]));

        let slots: Vec<ImageSlot> = images.iter().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![ImageSlot::Model, ImageSlot::Accessory]);
    }
}
