use std::fmt;

use certa_types::WalletAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A 32-byte transaction hash in `0x`-prefixed hex.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }

    /// Random hash, as produced by the simulated backends.
    pub fn random() -> Self {
        Self::from_bytes(rand::random())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}…)", &self.0[..self.0.len().min(10)])
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a broadcast, not yet confirmed, mint transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHandle {
    pub tx_hash: TxHash,
    pub chain_id: u64,
    pub submitted_at: DateTime<Utc>,
}

/// Identifiers read back after a mint confirms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintReceipt {
    pub tx_hash: TxHash,
    pub token_id: String,
    pub block_number: u64,
}

/// What the IP registrar records alongside the raw asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpMetadata {
    pub title: String,
    pub description: Option<String>,
    pub owner: WalletAddress,
    pub asset_url: String,
    pub metadata_url: String,
    /// Hex BLAKE3 digest of the asset bytes.
    pub content_hash: String,
}

/// Result of a successful IP registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRegistration {
    pub ip_id: String,
    pub tx_hash: Option<TxHash>,
}
