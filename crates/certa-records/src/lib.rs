//! Record storage for certa.
//!
//! Provides:
//! - the `RecordStore` trait boundary over users, items, reward log entries
//!   and minted certificates
//! - `InMemoryRecordStore` for tests and single-process deployments, with
//!   per-operation fault injection

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{RecordError, RecordResult};
pub use memory::{InMemoryRecordStore, RecordOp};
pub use traits::RecordStore;
