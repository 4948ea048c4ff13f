use certa_types::{ItemSubmission, LicenseTerms};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One `attributes` entry of an NFT metadata document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: Value,
}

impl NftAttribute {
    fn new(trait_type: &str, value: impl Into<Value>) -> Self {
        Self {
            trait_type: trait_type.to_string(),
            value: value.into(),
        }
    }
}

/// Token metadata in the ERC-721 JSON shape, plus the license terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image: String,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
    pub license: LicenseTerms,
}

impl NftMetadata {
    pub fn build(submission: &ItemSubmission, image_url: &str, license: &LicenseTerms) -> Self {
        let mut attributes = vec![NftAttribute::new("category", submission.category.trim())];
        if let Some(brand) = non_blank(&submission.brand) {
            attributes.push(NftAttribute::new("brand", brand));
        }
        if let Some(serial) = non_blank(&submission.serial_number) {
            attributes.push(NftAttribute::new("serial_number", serial));
        }
        attributes.push(NftAttribute::new("estimated_value", submission.estimated_value));

        Self {
            name: submission.title.trim().to_string(),
            description: non_blank(&submission.description).map(str::to_string),
            image: image_url.to_string(),
            attributes,
            license: license.clone(),
        }
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
