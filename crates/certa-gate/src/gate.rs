use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision, StageResult};
use crate::stages::{AssetStage, DocumentStage, LicenseStage, SubmissionStage, WalletStage};

// ---------------------------------------------------------------------------
// PreflightReport
// ---------------------------------------------------------------------------

/// The outcome of running an input through the gate.
#[derive(Clone, Debug)]
pub struct PreflightReport {
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    pub elapsed: Duration,
}

impl PreflightReport {
    pub fn is_passed(&self) -> bool {
        self.stage_results.iter().all(|r| r.passed)
    }

    /// Name and reason of the stage that refused the input.
    pub fn rejection(&self) -> Option<(&str, &str)> {
        self.stage_results
            .iter()
            .find(|r| !r.passed)
            .map(|r| (r.stage_name.as_str(), r.reason.as_deref().unwrap_or_default()))
    }

    /// Turn a refusal into [`GateError::Rejected`].
    pub fn into_result(self) -> Result<(), GateError> {
        match self.rejection() {
            None => Ok(()),
            Some((stage, reason)) => Err(GateError::Rejected {
                stage: stage.to_string(),
                reason: reason.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// PreflightGate
// ---------------------------------------------------------------------------

/// An ordered, fail-fast pipeline of preflight stages.
pub struct PreflightGate {
    stages: Vec<Box<dyn PreflightStage>>,
    config: GateConfig,
}

impl PreflightGate {
    /// An empty pipeline. Use [`Self::add_stage`] to populate it.
    pub fn new(config: GateConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
        }
    }

    /// Submission -> Document
    pub fn for_registration(config: GateConfig) -> Self {
        let mut gate = Self::new(config);
        gate.add_stage(Box::new(SubmissionStage));
        gate.add_stage(Box::new(DocumentStage));
        gate
    }

    /// Wallet -> Asset -> Submission -> License
    pub fn for_minting(config: GateConfig) -> Self {
        let mut gate = Self::new(config);
        gate.add_stage(Box::new(WalletStage));
        gate.add_stage(Box::new(AssetStage));
        gate.add_stage(Box::new(SubmissionStage));
        gate.add_stage(Box::new(LicenseStage));
        gate
    }

    pub fn add_stage(&mut self, stage: Box<dyn PreflightStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Run the pipeline. Evaluation stops at the first failing stage.
    pub fn evaluate(&self, input: &Preflight<'_>) -> Result<PreflightReport, GateError> {
        let start = Instant::now();
        let mut stage_results = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let stage_start = Instant::now();
            let decision = stage.evaluate(input, &self.config)?;
            let failed = !decision.is_pass();
            let reason = match decision {
                StageDecision::Pass => None,
                StageDecision::Fail { reason } => Some(reason),
            };

            stage_results.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: !failed,
                reason,
                elapsed: stage_start.elapsed(),
            });

            if failed {
                debug!(stage = stage.name(), "preflight rejected input");
                break;
            }
        }

        Ok(PreflightReport {
            stage_results,
            elapsed: start.elapsed(),
        })
    }

    /// Run the pipeline and fold any refusal into an error.
    pub fn check(&self, input: &Preflight<'_>) -> Result<(), GateError> {
        self.evaluate(input)?.into_result()
    }
}
