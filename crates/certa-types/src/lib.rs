//! Foundation types for certa.
//!
//! This crate provides the data model shared by every other certa crate:
//! the persisted rows written by the registration and minting workflows and
//! the submission shapes callers hand to them.
//!
//! # Key Types
//!
//! - [`WalletAddress`] - 20-byte account address, the key of a [`User`]
//! - [`Item`] - a registered physical item with its two proof documents
//! - [`RewardLogEntry`] - points granted for a registration
//! - [`MintedCertificate`] - an on-chain certificate summarising a mint
//! - [`LicenseTerms`] - terms attached to a certificate or IP registration
//! - [`ItemSubmission`] / [`UploadFile`] - caller-provided evidence

pub mod error;
pub mod ids;
pub mod license;
pub mod records;
pub mod submission;
pub mod wallet;

pub use error::TypeError;
pub use ids::{CertificateId, ItemId, RewardId};
pub use license::LicenseTerms;
pub use records::{
    Bucket, CertificateLinkage, Item, ItemDocuments, ItemStatus, MintStatus, MintedCertificate,
    ObjectRef, RewardLogEntry, User,
};
pub use submission::{DocumentKind, ItemSubmission, UploadFile};
pub use wallet::WalletAddress;
