//! Built-in preflight stages.

pub mod asset;
pub mod document;
pub mod license;
pub mod submission;
pub mod wallet;

pub use asset::AssetStage;
pub use document::DocumentStage;
pub use license::LicenseStage;
pub use submission::SubmissionStage;
pub use wallet::WalletStage;
