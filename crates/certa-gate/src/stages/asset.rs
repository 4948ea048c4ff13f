use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision};

/// Certificate asset size and type checks.
pub struct AssetStage;

impl PreflightStage for AssetStage {
    fn name(&self) -> &str {
        "asset"
    }

    fn evaluate(&self, input: &Preflight<'_>, config: &GateConfig) -> Result<StageDecision, GateError> {
        let Some(asset) = input.asset else {
            return Ok(StageDecision::fail("asset file is required"));
        };
        if asset.is_empty() {
            return Ok(StageDecision::fail("asset file is empty"));
        }
        if asset.len() > config.max_asset_bytes {
            return Ok(StageDecision::fail(format!(
                "asset is {} bytes; the limit is {}",
                asset.len(),
                config.max_asset_bytes
            )));
        }
        if !config.accepts_asset_type(&asset.content_type) {
            return Ok(StageDecision::fail(format!(
                "unsupported asset type '{}'",
                asset.content_type
            )));
        }
        Ok(StageDecision::Pass)
    }
}
