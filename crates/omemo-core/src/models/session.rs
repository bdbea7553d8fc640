// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::ids::Device;
use crate::models::keys::PublicKey;
use crate::models::trust::TrustState;

/// Opaque, engine-owned ratchet state (root key, chain keys, DH ratchet
/// keys, message counters, skipped-message-key map). The core never
/// interprets these bytes; only the concrete [`crate::traits::SessionEngine`]
/// implementation does. Kept opaque deliberately: the raw Double-Ratchet
/// math is an out-of-scope primitive per §1.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionData(Box<[u8]>);

impl From<Box<[u8]>> for SessionData {
    fn from(value: Box<[u8]>) -> Self {
        Self(value)
    }
}

impl From<Vec<u8>> for SessionData {
    fn from(value: Vec<u8>) -> Self {
        Self(value.into_boxed_slice())
    }
}

impl AsRef<[u8]> for SessionData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SessionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionData({} bytes)", self.0.len())
    }
}

/// §4.E: `None → PendingX3DH → Established → Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    PendingX3DH,
    Established,
    Terminated,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::None
    }
}

/// A Double-Ratchet session between our own device and one peer device, per
/// §3.
#[derive(Debug, Clone)]
pub struct Session {
    pub peer: Device,
    pub state: SessionState,
    pub trust: TrustState,
    /// The peer's identity public key, once learned from a bundle.
    pub identity: Option<PublicKey>,
    /// Three-strike counter per §4.G / §7: reset after any successful
    /// decrypt, and the session is torn down once this reaches 3.
    pub consecutive_corrupted: u32,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(peer: Device) -> Self {
        Self {
            peer,
            state: SessionState::None,
            trust: TrustState::Undecided,
            identity: None,
            consecutive_corrupted: 0,
            data: None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(
            self.state,
            SessionState::PendingX3DH | SessionState::Established
        )
    }
}
