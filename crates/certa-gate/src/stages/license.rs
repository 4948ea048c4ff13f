use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision};

/// License terms are internally consistent. Absent terms pass; the
/// workflow substitutes the default.
pub struct LicenseStage;

impl PreflightStage for LicenseStage {
    fn name(&self) -> &str {
        "license"
    }

    fn evaluate(&self, input: &Preflight<'_>, _config: &GateConfig) -> Result<StageDecision, GateError> {
        Ok(match input.license.map(|l| l.validate()) {
            Some(Err(e)) => StageDecision::fail(e.to_string()),
            _ => StageDecision::Pass,
        })
    }
}
