//! Preflight checks for certa workflows.
//!
//! Both sagas refuse bad input before anything is uploaded. The gate runs
//! an ordered pipeline of [`PreflightStage`]s over a [`Preflight`] input and
//! stops at the first stage that fails.
//!
//! ```rust
//! use certa_gate::{GateConfig, Preflight, PreflightGate};
//! use certa_types::ItemSubmission;
//!
//! let gate = PreflightGate::for_registration(GateConfig::default());
//! let submission = ItemSubmission::new("", "Jewelry", 500.0);
//! let report = gate.evaluate(&Preflight::new().submission(&submission)).unwrap();
//! assert!(!report.is_passed());
//! assert_eq!(report.rejection().unwrap().0, "submission");
//! ```
//!
//! The [`SubmissionGuard`] is separate from the pipeline: it refuses a second
//! in-flight workflow for the same owner and content.

pub mod config;
pub mod error;
pub mod gate;
pub mod guard;
pub mod stage;
pub mod stages;

pub use config::GateConfig;
pub use error::GateError;
pub use gate::{PreflightGate, PreflightReport};
pub use guard::{SubmissionGuard, SubmissionKey, SubmissionPermit};
pub use stage::{Preflight, PreflightStage, StageDecision, StageResult, WalletSession};
pub use stages::{AssetStage, DocumentStage, LicenseStage, SubmissionStage, WalletStage};
