use serde::{Deserialize, Serialize};

/// Limits enforced by the preflight stages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub max_title_chars: usize,
    /// Limit for description, brand and serial number.
    pub max_text_chars: usize,
    pub max_document_bytes: usize,
    pub max_asset_bytes: usize,
    /// Content types accepted for certificate assets.
    pub accepted_asset_types: Vec<String>,
    /// The chain the wallet must be connected to before minting.
    pub expected_chain_id: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_title_chars: 200,
            max_text_chars: 2_000,
            max_document_bytes: 10 * 1024 * 1024,
            max_asset_bytes: 25 * 1024 * 1024,
            accepted_asset_types: [
                "image/png",
                "image/jpeg",
                "image/gif",
                "image/webp",
                "image/svg+xml",
                "video/mp4",
                "audio/mpeg",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            expected_chain_id: 1315,
        }
    }
}

impl GateConfig {
    pub fn accepts_asset_type(&self, content_type: &str) -> bool {
        let base = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        self.accepted_asset_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(base))
    }
}
