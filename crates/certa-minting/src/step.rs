use std::fmt;

use certa_chain::TxHash;

use crate::outcome::{MintFailure, MintStage};

/// Sub-state of the on-chain step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainPhase {
    /// Building and broadcasting the transaction.
    Submitting,
    /// Broadcast; waiting for the receipt.
    Submitted { tx: TxHash },
    /// Receipt received.
    Confirmed { tx: TxHash },
}

impl ChainPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submitting => "submitting",
            Self::Submitted { .. } => "submitted",
            Self::Confirmed { .. } => "confirmed",
        }
    }

    pub fn tx(&self) -> Option<&TxHash> {
        match self {
            Self::Submitting => None,
            Self::Submitted { tx } | Self::Confirmed { tx } => Some(tx),
        }
    }
}

/// Where a mint attempt is.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum MintStep {
    #[default]
    Idle,
    Uploading,
    MintingOnChain(ChainPhase),
    RegisteringIp,
    Completed,
    Failed(MintFailure),
}

impl MintStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::MintingOnChain(_) => "minting_on_chain",
            Self::RegisteringIp => "registering_ip",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// The stage a failure in this step is attributed to.
    pub fn stage(&self) -> MintStage {
        match self {
            Self::Idle | Self::Uploading => MintStage::Uploading,
            Self::MintingOnChain(_) => MintStage::MintingOnChain,
            Self::RegisteringIp => MintStage::RegisteringIp,
            Self::Completed | Self::Failed(_) => MintStage::Finalizing,
        }
    }

    /// The transition table.
    ///
    /// `Uploading` may enter the chain step at any phase because a retry
    /// resumes a pending or confirmed transaction instead of submitting a
    /// new one. `Failed -> Idle` is the retry edge; whether a particular
    /// failure may take it is decided by the attempt.
    pub fn can_transition_to(&self, next: &MintStep) -> bool {
        use ChainPhase::*;
        use MintStep::*;

        match (self, next) {
            (Completed, _) => false,
            (Failed(_), Idle) => true,
            (Failed(_), _) => false,
            (_, Failed(_)) => true,

            (Idle, Uploading) => true,
            (Uploading, MintingOnChain(_)) => true,
            (Uploading, RegisteringIp) => true,
            (MintingOnChain(Submitting), MintingOnChain(Submitted { .. })) => true,
            (MintingOnChain(Submitted { .. }), MintingOnChain(Confirmed { .. })) => true,
            (MintingOnChain(Confirmed { .. }), RegisteringIp) => true,
            (MintingOnChain(Confirmed { .. }), Completed) => true,
            (RegisteringIp, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MintStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MintingOnChain(phase) => write!(f, "minting_on_chain({})", phase.name()),
            Self::Failed(failure) => write!(f, "failed({})", failure.stage),
            other => f.write_str(other.name()),
        }
    }
}
