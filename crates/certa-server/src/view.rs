//! JSON shapes of mint attempts.

use certa_chain::IpRegistration;
use certa_minting::{AttemptId, MintError, MintMode, MintOutcome, MintStep};
use certa_types::MintedCertificate;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FailureView {
    pub step: &'static str,
    pub error_kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct StepView {
    pub name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureView>,
}

impl From<&MintStep> for StepView {
    fn from(step: &MintStep) -> Self {
        let (phase, tx_hash) = match step {
            MintStep::MintingOnChain(phase) => {
                (Some(phase.name()), phase.tx().map(|tx| tx.to_string()))
            }
            _ => (None, None),
        };
        let failure = match step {
            MintStep::Failed(f) => Some(FailureView {
                step: f.stage.as_str(),
                error_kind: f.error.kind(),
                message: f.error.to_string(),
                retryable: f.is_retryable(),
            }),
            _ => None,
        };
        Self {
            name: step.name(),
            phase,
            tx_hash,
            failure,
        }
    }
}

/// The discriminated final result of a mint.
#[derive(Debug, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum OutcomeView {
    Completed {
        certificate: Option<MintedCertificate>,
        ip: Option<IpRegistration>,
    },
    Partial {
        certificate: Option<MintedCertificate>,
        error_kind: &'static str,
        message: String,
    },
    Failed {
        step: &'static str,
        error_kind: &'static str,
        message: String,
    },
}

impl OutcomeView {
    /// A request that never became an attempt.
    pub fn rejected(e: &MintError) -> Self {
        Self::Failed {
            step: "preflight",
            error_kind: e.kind(),
            message: e.to_string(),
        }
    }

    /// A form that could not be read into a request.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Failed {
            step: "preflight",
            error_kind: "validation_error",
            message: message.into(),
        }
    }
}

impl From<&MintOutcome> for OutcomeView {
    fn from(outcome: &MintOutcome) -> Self {
        match outcome {
            MintOutcome::Completed { certificate, ip } => Self::Completed {
                certificate: certificate.clone(),
                ip: ip.clone(),
            },
            MintOutcome::Partial {
                certificate,
                ip_error,
            } => Self::Partial {
                certificate: certificate.clone(),
                error_kind: ip_error.kind(),
                message: ip_error.to_string(),
            },
            MintOutcome::Failed(f) => Self::Failed {
                step: f.stage.as_str(),
                error_kind: f.error.kind(),
                message: f.error.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MintStatusView {
    pub attempt_id: AttemptId,
    pub mode: MintMode,
    pub step: StepView,
    /// Absent while a run is in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<u32>,
    pub outcome: Option<OutcomeView>,
}
