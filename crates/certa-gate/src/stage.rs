use std::time::Duration;

use certa_types::{ItemSubmission, LicenseTerms, UploadFile, WalletAddress};
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;
use crate::error::GateError;

// ---------------------------------------------------------------------------
// WalletSession
// ---------------------------------------------------------------------------

/// What the caller's wallet connection looks like at submission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub address: WalletAddress,
    pub connected: bool,
    /// Chain the wallet reports, if it reported one.
    pub chain_id: Option<u64>,
}

impl WalletSession {
    pub fn connected(address: WalletAddress, chain_id: u64) -> Self {
        Self {
            address,
            connected: true,
            chain_id: Some(chain_id),
        }
    }

    pub fn disconnected(address: WalletAddress) -> Self {
        Self {
            address,
            connected: false,
            chain_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Preflight input
// ---------------------------------------------------------------------------

/// Everything a stage may inspect. Workflows fill in the parts they have.
#[derive(Clone, Copy, Debug, Default)]
pub struct Preflight<'a> {
    pub submission: Option<&'a ItemSubmission>,
    pub bill: Option<&'a UploadFile>,
    pub id_document: Option<&'a UploadFile>,
    pub wallet: Option<&'a WalletSession>,
    pub asset: Option<&'a UploadFile>,
    pub license: Option<&'a LicenseTerms>,
}

impl<'a> Preflight<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submission(mut self, submission: &'a ItemSubmission) -> Self {
        self.submission = Some(submission);
        self
    }

    pub fn documents(mut self, bill: &'a UploadFile, id_document: &'a UploadFile) -> Self {
        self.bill = Some(bill);
        self.id_document = Some(id_document);
        self
    }

    pub fn wallet(mut self, wallet: &'a WalletSession) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn asset(mut self, asset: &'a UploadFile) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn license(mut self, license: &'a LicenseTerms) -> Self {
        self.license = Some(license);
        self
    }
}

// ---------------------------------------------------------------------------
// StageDecision / StageResult
// ---------------------------------------------------------------------------

/// The outcome of a single stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    Pass,
    Fail { reason: String },
}

impl StageDecision {
    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail {
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Recorded result of a stage that ran.
#[derive(Clone, Debug)]
pub struct StageResult {
    pub stage_name: String,
    pub passed: bool,
    pub reason: Option<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// PreflightStage trait
// ---------------------------------------------------------------------------

/// One check in the preflight pipeline.
///
/// Object-safe and `Send + Sync` so stages can live in a
/// `Vec<Box<dyn PreflightStage>>` shared across tasks.
pub trait PreflightStage: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, input: &Preflight<'_>, config: &GateConfig)
        -> Result<StageDecision, GateError>;
}
