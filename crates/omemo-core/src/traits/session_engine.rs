// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use async_trait::async_trait;

use crate::error::{CryptoError, SessionError};
use crate::models::{Device, WrappedKey};

/// §4.E: the Double-Ratchet-over-X3DH state machine. The raw ratchet math
/// and the X3DH primitive itself are delegated to a concrete
/// implementation (e.g. a real Double-Ratchet library); this trait only
/// describes the operations the rest of the core needs.
#[cfg_attr(feature = "test", mockall::automock)]
#[async_trait]
pub trait SessionEngine: Send + Sync {
    /// Returns the stored session if present and usable; otherwise fetches
    /// the peer bundle (via the caller-supplied bundle fetch, since
    /// `BundleService` sits above this trait) and runs X3DH to derive and
    /// persist a new one. Implementations that need a bundle call back out
    /// through whatever mechanism they were constructed with; this trait
    /// only commits to the post-condition: a usable session exists for
    /// `peer` when this returns `Ok`.
    async fn ensure_session(&self, peer: &Device) -> Result<(), SessionError>;

    /// Advances the sending chain one step and wraps `payload_key` for
    /// `peer`. The returned flag indicates whether this message carries the
    /// X3DH pre-key prelude (true until the peer acknowledges).
    async fn encrypt_key(
        &self,
        peer: &Device,
        payload_key: &[u8],
    ) -> Result<WrappedKey, SessionError>;

    /// Unwraps the recipient key from `sender`. If `is_pre_key`, first runs
    /// the responder-side X3DH (consuming the indicated one-time pre-key),
    /// then processes as a ratchet message. Out-of-order delivery is
    /// tolerated up to the configured skip bound; beyond that the message
    /// is reported undecryptable via [`CryptoError::SkippedOverflow`].
    async fn decrypt_key(
        &self,
        sender: &Device,
        wrapped: &[u8],
        is_pre_key: bool,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Produces a fresh, empty key-transport wrap to advance forward
    /// secrecy on demand (§4.E).
    async fn send_ratchet_update(&self, peer: &Device) -> Result<WrappedKey, SessionError>;

    /// Deletes the session; the next send rebuilds it from scratch.
    async fn reset(&self, peer: &Device) -> Result<(), SessionError>;
}
