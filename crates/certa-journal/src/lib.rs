//! Write-ahead upload intents for certa.
//!
//! Before the registration workflow uploads a document it records an
//! [`UploadIntent`]. The intent is resolved when the item row commits or
//! when compensation deletes the object. Intents whose compensation failed,
//! or that were left pending by a crash, are picked up by the
//! [`OrphanSweeper`], which retries the delete in the background.
//!
//! Two journal backends implement [`IntentJournal`]:
//!
//! - [`InMemoryJournal`] -- process-local, for tests and the memory backend
//! - [`FileJournal`] -- length + CRC32 framed records in a single file

pub mod config;
pub mod error;
pub mod file;
pub mod intent;
pub mod memory;
pub mod sweeper;

pub use config::SweeperConfig;
pub use error::{JournalError, JournalResult};
pub use file::FileJournal;
pub use intent::{IntentId, IntentJournal, IntentState, JournalRecord, UploadIntent};
pub use memory::InMemoryJournal;
pub use sweeper::{OrphanSweeper, SweepReport};
