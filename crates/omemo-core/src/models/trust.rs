// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use serde::{Deserialize, Serialize};

/// Trust decision for a `(device, fingerprint)` tuple, per §3/§4.H. Default
/// on first sight is `Undecided`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustState {
    Undecided,
    Trusted,
    Untrusted,
}

impl Default for TrustState {
    fn default() -> Self {
        TrustState::Undecided
    }
}

impl TrustState {
    pub fn is_trusted(&self) -> bool {
        matches!(self, TrustState::Trusted)
    }

    pub fn is_undecided(&self) -> bool {
        matches!(self, TrustState::Undecided)
    }
}
