use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Upper bound for a revenue share, in basis points (100%).
pub const MAX_REV_SHARE_BPS: u16 = 10_000;

/// License terms attached to a minted certificate and passed to the IP
/// registrar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseTerms {
    /// Whether licensees may use the content commercially.
    pub commercial_use: bool,
    /// Whether derivative works may be registered against this content.
    pub derivatives_allowed: bool,
    /// Whether derivatives must credit the original.
    pub attribution_required: bool,
    /// Share of commercial revenue owed to the owner, in basis points.
    pub commercial_rev_share_bps: u16,
}

impl LicenseTerms {
    /// Non-commercial remixing: derivatives allowed with attribution, no
    /// commercial use.
    pub fn non_commercial_remix() -> Self {
        Self {
            commercial_use: false,
            derivatives_allowed: true,
            attribution_required: true,
            commercial_rev_share_bps: 0,
        }
    }

    /// Commercial use with a revenue share.
    pub fn commercial(rev_share_bps: u16) -> Self {
        Self {
            commercial_use: true,
            derivatives_allowed: true,
            attribution_required: true,
            commercial_rev_share_bps: rev_share_bps,
        }
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.commercial_rev_share_bps > MAX_REV_SHARE_BPS {
            return Err(TypeError::InvalidLicense(format!(
                "revenue share {} bps exceeds {MAX_REV_SHARE_BPS}",
                self.commercial_rev_share_bps
            )));
        }
        if !self.commercial_use && self.commercial_rev_share_bps > 0 {
            return Err(TypeError::InvalidLicense(
                "revenue share requires commercial use".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LicenseTerms {
    fn default() -> Self {
        Self::non_commercial_remix()
    }
}
