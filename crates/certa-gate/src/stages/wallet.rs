use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{Preflight, PreflightStage, StageDecision};

/// The wallet is connected and on the expected chain.
pub struct WalletStage;

impl PreflightStage for WalletStage {
    fn name(&self) -> &str {
        "wallet"
    }

    fn evaluate(&self, input: &Preflight<'_>, config: &GateConfig) -> Result<StageDecision, GateError> {
        let Some(wallet) = input.wallet else {
            return Ok(StageDecision::fail("wallet is not connected"));
        };
        if !wallet.connected {
            return Ok(StageDecision::fail("wallet is not connected"));
        }
        match wallet.chain_id {
            Some(id) if id == config.expected_chain_id => Ok(StageDecision::Pass),
            Some(id) => Ok(StageDecision::fail(format!(
                "wallet is on chain {id}; switch to chain {}",
                config.expected_chain_id
            ))),
            None => Ok(StageDecision::fail(format!(
                "wallet did not report a chain; expected chain {}",
                config.expected_chain_id
            ))),
        }
    }
}
