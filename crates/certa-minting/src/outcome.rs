use std::fmt;

use certa_chain::{IpError, IpRegistration};
use certa_types::MintedCertificate;
use serde::{Deserialize, Serialize};

use crate::error::MintStepError;

/// The part of the workflow a failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintStage {
    Preflight,
    Uploading,
    MintingOnChain,
    RegisteringIp,
    /// Writing the certificate row and item linkage.
    Finalizing,
}

impl MintStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Uploading => "uploading",
            Self::MintingOnChain => "minting_on_chain",
            Self::RegisteringIp => "registering_ip",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed step and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintFailure {
    pub stage: MintStage,
    pub error: MintStepError,
}

impl MintFailure {
    pub fn new(stage: MintStage, error: MintStepError) -> Self {
        Self { stage, error }
    }

    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

impl fmt::Display for MintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

/// Terminal result of running a mint attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MintOutcome {
    /// Every requested step succeeded. `certificate` is absent for
    /// `ip_only`, `ip` is absent for `mint_only`.
    Completed {
        certificate: Option<MintedCertificate>,
        ip: Option<IpRegistration>,
    },
    /// The certificate was minted but IP registration failed. Retrying the
    /// attempt runs only the IP step.
    Partial {
        certificate: Option<MintedCertificate>,
        ip_error: IpError,
    },
    Failed(MintFailure),
}

impl MintOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Partial { .. } => "partial",
            Self::Failed(_) => "failed",
        }
    }

    pub fn certificate(&self) -> Option<&MintedCertificate> {
        match self {
            Self::Completed { certificate, .. } | Self::Partial { certificate, .. } => {
                certificate.as_ref()
            }
            Self::Failed(_) => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
