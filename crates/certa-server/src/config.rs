use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use certa_chain::ChainConfig;
use certa_gate::GateConfig;
use certa_journal::SweeperConfig;
use certa_minting::MintingConfig;
use certa_registration::RegistrationConfig;
use certa_store::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, multipart uploads included.
    pub max_body_bytes: usize,
    /// How long a finished mint attempt stays pollable.
    pub mint_retention_secs: u64,
}

impl ServerConfig {
    pub fn mint_retention(&self) -> Duration {
        Duration::from_secs(self.mint_retention_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            max_body_bytes: 64 * 1024 * 1024,
            mint_retention_secs: 60 * 60,
        }
    }
}

/// Full service configuration, one section per crate.
///
/// Every section is optional in the TOML file; missing sections and fields
/// take their defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertaConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub chain: ChainConfig,
    pub gate: GateConfig,
    pub registration: RegistrationConfig,
    pub minting: MintingConfig,
    pub sweeper: SweeperConfig,
}

impl CertaConfig {
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certa_store::StorageBackend;

    #[test]
    fn defaults() {
        let c = CertaConfig::default();
        assert_eq!(c.server.bind_addr, "127.0.0.1:8787".parse::<SocketAddr>().unwrap());
        assert_eq!(c.storage.public_base_url, "http://127.0.0.1:8787/v1/objects");
        assert_eq!(c.registration.reward_points, 10);
        assert_eq!(c.gate.expected_chain_id, 1315);
        assert_eq!(c.chain.chain_id, 1315);
        assert_eq!(c.sweeper.interval_secs, 60);
        assert_eq!(c.sweeper.stale_after_secs, 900);
        assert_eq!(c.server.mint_retention(), Duration::from_secs(3600));
    }

    #[test]
    fn default_survives_toml() {
        let c = CertaConfig::default();
        let text = c.to_toml().unwrap();
        assert!(text.contains("[server]"));
        assert_eq!(CertaConfig::from_toml(&text).unwrap(), c);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let c = CertaConfig::from_toml(
            r#"
            [storage]
            backend = "filesystem"
            root = "/srv/certa"

            [registration]
            reward_points = 25
            "#,
        )
        .unwrap();
        assert_eq!(c.storage.backend, StorageBackend::Filesystem);
        assert_eq!(c.storage.buckets.proof, "proofs");
        assert_eq!(c.registration.reward_points, 25);
        assert_eq!(c.registration.reward_reason, "item_registration");
        assert_eq!(c.server, ServerConfig::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certa.toml");
        std::fs::write(&path, "[server]\nbind_addr = \"0.0.0.0:9000\"\n").unwrap();
        let c = CertaConfig::load(&path).unwrap();
        assert_eq!(c.server.bind_addr.port(), 9000);

        let missing = CertaConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ServerError::Config(_)));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            CertaConfig::from_toml("[server"),
            Err(ServerError::Config(_))
        ));
    }
}
