/// Errors from the ledger client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The wallet owner declined to sign, or the transaction was dropped on
    /// their behalf. Not retryable.
    #[error("user rejected transaction: {0}")]
    UserRejected(String),

    /// The transaction was mined without minting, or fell out of the
    /// mempool. Retrying submits a new transaction.
    #[error("transaction reverted: {0}")]
    Reverted(String),

    /// RPC failure, timeout, or nonce race. Says nothing about the
    /// transaction itself; safe to retry.
    #[error("transient chain error: {0}")]
    Transient(String),
}

impl ChainError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Reverted(_))
    }

    /// Whether the submitted transaction is known to be dead, so a retry
    /// must submit again rather than keep waiting on it.
    pub fn ends_transaction(&self) -> bool {
        matches!(self, Self::UserRejected(_) | Self::Reverted(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserRejected(_) => "user_rejected",
            Self::Reverted(_) => "reverted",
            Self::Transient(_) => "transient",
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Errors from the IP registrar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IpError {
    /// The protocol refused the registration (bad terms, duplicate content).
    #[error("ip registration rejected: {0}")]
    Rejected(String),

    /// The protocol could not be reached.
    #[error("ip registrar unavailable: {0}")]
    Unavailable(String),
}

impl IpError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "ip_rejected",
            Self::Unavailable(_) => "ip_unavailable",
        }
    }
}

pub type IpResult<T> = Result<T, IpError>;
