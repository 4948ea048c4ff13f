use certa_types::Item;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;

/// Caller-facing result of a registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RegistrationResponse {
    Success { item: Item },
    Failure { error_kind: String, message: String },
}

impl RegistrationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<Item, RegistrationError>> for RegistrationResponse {
    fn from(result: Result<Item, RegistrationError>) -> Self {
        match result {
            Ok(item) => Self::Success { item },
            Err(e) => Self::Failure {
                error_kind: e.kind().to_string(),
                message: e.detail(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certa_types::WalletAddress;

    #[test]
    fn failure_shape() {
        let owner = WalletAddress::from_bytes([0xaa; 20]);
        let resp = RegistrationResponse::from(Err(RegistrationError::UserNotFound(owner)));
        assert!(!resp.is_success());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["result"], "failure");
        assert_eq!(json["error_kind"], "user_not_found");
        assert!(json["message"].as_str().unwrap().contains(&owner.to_string()));
    }
}
