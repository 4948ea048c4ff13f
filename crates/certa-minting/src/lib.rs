//! Certificate minting for certa.
//!
//! A mint attempt walks a closed state machine:
//!
//! ```text
//! Idle ─► Uploading ─► MintingOnChain(Submitting ─► Submitted ─► Confirmed) ─┬─► Completed
//!              │                                                              └─► RegisteringIp ─► Completed
//!              └──────────────────────── (ip_only) ─────────────────────────────► RegisteringIp
//!
//! any non-terminal step ─► Failed(MintFailure) ─► Idle   (retry, when retryable)
//! ```
//!
//! The attempt remembers every sub-step that succeeded ([`MintProgress`]), so
//! a retry never re-uploads the asset, never re-submits a transaction that
//! is still pending, and never re-mints a confirmed token. Callers observe
//! progress through a `tokio::sync::watch` step stream and receive a single
//! terminal [`MintOutcome`].

pub mod attempt;
pub mod config;
pub mod error;
pub mod metadata;
pub mod orchestrator;
pub mod outcome;
pub mod step;

pub use attempt::{
    AttemptId, MintAttempt, MintCanceller, MintMode, MintProgress, MintRequest, UploadedAsset,
};
pub use config::MintingConfig;
pub use error::{MintError, MintStepError};
pub use metadata::{NftAttribute, NftMetadata};
pub use orchestrator::{MintHandle, MintingOrchestrator};
pub use outcome::{MintFailure, MintOutcome, MintStage};
pub use step::{ChainPhase, MintStep};
