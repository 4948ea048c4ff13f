use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use certa_chain::{IpRegistration, MintReceipt, TxHandle};
use certa_gate::{SubmissionPermit, WalletSession};
use certa_types::{
    ItemId, ItemSubmission, LicenseTerms, MintedCertificate, ObjectRef, TypeError, UploadFile,
    WalletAddress,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::error::MintError;
use crate::outcome::MintOutcome;
use crate::step::MintStep;

// ---------------------------------------------------------------------------
// AttemptId
// ---------------------------------------------------------------------------

/// Identifier of a mint attempt (UUID v7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(uuid::Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttemptId({})", &self.0.to_string()[..8])
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| TypeError::UnknownVariant {
                kind: "attempt id",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MintMode / MintRequest
// ---------------------------------------------------------------------------

/// Which artifacts an attempt produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MintMode {
    MintOnly,
    IpOnly,
    MintAndIp,
}

impl MintMode {
    pub fn includes_mint(&self) -> bool {
        matches!(self, Self::MintOnly | Self::MintAndIp)
    }

    pub fn includes_ip(&self) -> bool {
        matches!(self, Self::IpOnly | Self::MintAndIp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MintOnly => "mint_only",
            Self::IpOnly => "ip_only",
            Self::MintAndIp => "mint_and_ip",
        }
    }
}

impl fmt::Display for MintMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MintMode {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mint_only" => Ok(Self::MintOnly),
            "ip_only" => Ok(Self::IpOnly),
            "mint_and_ip" => Ok(Self::MintAndIp),
            other => Err(TypeError::UnknownVariant {
                kind: "mint mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Everything needed to start a mint.
#[derive(Clone, Debug)]
pub struct MintRequest {
    pub asset: UploadFile,
    pub submission: ItemSubmission,
    pub wallet: WalletSession,
    pub mode: MintMode,
    /// Item to link the certificate and IP id to, if any.
    pub item: Option<ItemId>,
    pub license: LicenseTerms,
}

impl MintRequest {
    pub fn new(asset: UploadFile, submission: ItemSubmission, wallet: WalletSession, mode: MintMode) -> Self {
        Self {
            asset,
            submission,
            wallet,
            mode,
            item: None,
            license: LicenseTerms::default(),
        }
    }

    pub fn for_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_license(mut self, license: LicenseTerms) -> Self {
        self.license = license;
        self
    }

    pub fn owner(&self) -> WalletAddress {
        self.wallet.address
    }
}

// ---------------------------------------------------------------------------
// MintProgress
// ---------------------------------------------------------------------------

/// The uploaded asset and its metadata document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedAsset {
    pub asset: ObjectRef,
    pub metadata: ObjectRef,
    /// Hex BLAKE3 digest of the asset bytes.
    pub content_hash: String,
}

/// Sub-steps that have already succeeded within an attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MintProgress {
    pub uploaded: Option<UploadedAsset>,
    /// Broadcast but not yet confirmed.
    pub pending_tx: Option<TxHandle>,
    pub receipt: Option<MintReceipt>,
    /// Persisted certificate row.
    pub certificate: Option<MintedCertificate>,
    /// Whether the item (if any) carries the certificate linkage.
    pub item_linked: bool,
    pub ip: Option<IpRegistration>,
    /// Whether the IP id has been written to the certificate and item.
    pub ip_linked: bool,
}

// ---------------------------------------------------------------------------
// MintCanceller
// ---------------------------------------------------------------------------

/// Requests cancellation of an attempt.
///
/// Cancellation takes effect at the next checkpoint before the transaction
/// is broadcast. Once broadcast it is advisory only: the transaction cannot
/// be recalled, so the attempt runs to completion.
#[derive(Clone, Debug, Default)]
pub struct MintCanceller(Arc<AtomicBool>);

impl MintCanceller {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MintAttempt
// ---------------------------------------------------------------------------

/// State of one mint attempt, owned by exactly one workflow at a time.
pub struct MintAttempt {
    id: AttemptId,
    request: MintRequest,
    step: MintStep,
    pub(crate) progress: MintProgress,
    outcome: Option<MintOutcome>,
    runs: u32,
    steps: watch::Sender<MintStep>,
    canceller: MintCanceller,
    permit: Option<SubmissionPermit>,
}

impl MintAttempt {
    pub(crate) fn new(request: MintRequest, permit: Option<SubmissionPermit>) -> Self {
        let (steps, _) = watch::channel(MintStep::Idle);
        Self {
            id: AttemptId::new(),
            request,
            step: MintStep::Idle,
            progress: MintProgress::default(),
            outcome: None,
            runs: 0,
            steps,
            canceller: MintCanceller::default(),
            permit,
        }
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    pub fn request(&self) -> &MintRequest {
        &self.request
    }

    pub fn step(&self) -> &MintStep {
        &self.step
    }

    pub fn progress(&self) -> &MintProgress {
        &self.progress
    }

    /// The outcome of the most recent run, if it has finished.
    pub fn outcome(&self) -> Option<&MintOutcome> {
        self.outcome.as_ref()
    }

    /// How many times the attempt has been run.
    pub fn runs(&self) -> u32 {
        self.runs
    }

    /// A stream of step changes. The current step is visible immediately.
    pub fn subscribe(&self) -> watch::Receiver<MintStep> {
        self.steps.subscribe()
    }

    pub fn canceller(&self) -> MintCanceller {
        self.canceller.clone()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.canceller.is_cancelled()
    }

    /// Move to `next`, publishing it on the step stream.
    pub(crate) fn transition(&mut self, next: MintStep) -> Result<(), MintError> {
        if !self.step.can_transition_to(&next) {
            return Err(MintError::IllegalTransition {
                from: self.step.name(),
                to: next.name(),
            });
        }
        debug!(attempt = %self.id, from = %self.step, to = %next, "mint step");
        self.step = next.clone();
        self.steps.send_replace(next);
        Ok(())
    }

    /// Whether the attempt can be run now: it is fresh, or it failed in a
    /// way that may be retried.
    pub fn check_runnable(&self) -> Result<(), MintError> {
        match &self.step {
            MintStep::Idle => Ok(()),
            MintStep::Completed => Err(MintError::AlreadyCompleted),
            MintStep::Failed(failure) if failure.is_retryable() => Ok(()),
            MintStep::Failed(failure) => Err(MintError::NotRetryable(failure.to_string())),
            running => Err(MintError::IllegalTransition {
                from: running.name(),
                to: MintStep::Idle.name(),
            }),
        }
    }

    /// Prepare a fresh or retryable attempt for a run.
    pub(crate) fn begin_run(&mut self) -> Result<(), MintError> {
        self.check_runnable()?;
        if matches!(self.step, MintStep::Failed(_)) {
            self.transition(MintStep::Idle)?;
            self.canceller.reset();
        }
        self.outcome = None;
        self.runs += 1;
        Ok(())
    }

    /// Record the outcome of a run. The duplicate-submission permit is
    /// released once the attempt can make no further progress.
    pub(crate) fn finish(&mut self, outcome: MintOutcome) -> MintOutcome {
        let done = match &self.step {
            MintStep::Completed => true,
            MintStep::Failed(failure) => !failure.is_retryable(),
            _ => false,
        };
        if done {
            self.permit = None;
        }
        self.outcome = Some(outcome.clone());
        outcome
    }
}

impl fmt::Debug for MintAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintAttempt")
            .field("id", &self.id)
            .field("mode", &self.request.mode)
            .field("step", &self.step)
            .field("runs", &self.runs)
            .finish()
    }
}
