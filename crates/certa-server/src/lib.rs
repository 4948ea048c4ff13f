//! HTTP server for certa.
//!
//! Exposes item registration, background mint attempts with a pollable step
//! view, and the object store behind its public URLs.

pub mod config;
pub mod error;
pub mod form;
pub mod handler;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod view;

pub use config::{CertaConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use registry::{MintEntry, MintRegistry};
pub use server::CertaServer;
pub use state::{AppState, AppStateInner};
