//! Item registration for certa.
//!
//! [`RegistrationOrchestrator::register`] turns item details plus two proof
//! documents into an `Item` row:
//!
//! 1. upload the bill to the proof bucket
//! 2. upload the id document to the id bucket
//! 3. insert the item, status `pending_verification`
//! 4. grant reward points, in the background
//!
//! A failure in step 2 deletes the bill; a failure in step 3 deletes both
//! documents. Every upload is preceded by a journal intent so that a delete
//! which itself fails is retried later by the orphan sweeper. Step 4 never
//! affects the result; its outcome is published on the [`RewardEmitter`]
//! channel.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod response;
pub mod reward;

pub use config::RegistrationConfig;
pub use error::RegistrationError;
pub use orchestrator::RegistrationOrchestrator;
pub use response::RegistrationResponse;
pub use reward::{RewardEmitter, RewardEvent};
