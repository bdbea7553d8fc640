// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::Device;

/// §7 "Configuration" — fatal, surfaced immediately.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("OmemoCore has not been initialized for the connected account yet.")]
    NotInitialized,
    #[error("No TrustCallback has been installed.")]
    NoTrustCallback,
    #[error("A TrustCallback has already been installed; it may only be installed once.")]
    TrustCallbackAlreadyInstalled,
}

/// §7 "Identity".
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("The identity key for {0} is corrupted or could not be parsed.")]
    CorruptedKey(Device),
    #[error("No fingerprint is known for {0}.")]
    MissingFingerprint(Device),
}

/// §7 "Session". A single device's session-establishment failure;
/// `Encryptor` aggregates these across a batch of devices into
/// `CannotEstablish`, per §4.F.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No pre-key bundle is published for {0}.")]
    NoBundle(Device),
    #[error("The signed pre-key signature for {0} does not verify.")]
    BadSignature(Device),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// §7 "Crypto" — per-message; causes that message to be dropped. Three
/// consecutive `Corrupted` from one peer device force a session reset
/// (§4.G, a deliberate deviation from the source per §9).
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("AEAD authentication failed for {0}.")]
    AuthFailure(Device),
    #[error("More than {max_skip} ratchet steps were skipped for {device}; message dropped.")]
    SkippedOverflow { device: Device, max_skip: u32 },
    #[error("The session with {0} appears corrupted.")]
    Corrupted(Device),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// §7 "Transport" — transient; the caller retries.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Not connected.")]
    NotConnected,
    #[error("No response from the server.")]
    NoResponse,
    #[error("The operation was interrupted.")]
    Interrupted,
}

/// §7 "Protocol".
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("The room does not support OMEMO (it is public or open).")]
    NoOmemoSupport,
}

/// Raised by [`crate::trust_gate::TrustGate`] before any ciphertext is
/// produced, per §4.F/§4.H. Recoverable: the caller resolves trust via UI
/// and retries.
#[derive(Debug, thiserror::Error)]
#[error("{} device(s) require a trust decision before this message can be sent", .0.len())]
pub struct UndecidedDevices(pub Vec<Device>);

/// `TrustGate::gate`'s outcome. Kept distinct from `EncryptError` so the
/// undecided case stays a typed variant all the way out rather than
/// collapsing into `anyhow::Error` (which `EncryptError::Other` would catch
/// indistinguishably from any other failure) on its way through `?`.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Undecided(#[from] UndecidedDevices),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// §7 "Encryptor" top-level outcome.
#[derive(Debug, thiserror::Error)]
pub enum EncryptError {
    #[error(transparent)]
    Undecided(#[from] UndecidedDevices),
    #[error("Failed to establish a session with {} of {} devices", .0.failures.len(), .0.failures.len() + .0.successes.len())]
    CannotEstablish(CannotEstablish),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<GateError> for EncryptError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Undecided(undecided) => EncryptError::Undecided(undecided),
            other => EncryptError::Other(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug)]
pub struct CannotEstablish {
    pub successes: Vec<Device>,
    pub failures: Vec<(Device, anyhow::Error)>,
}

/// §7 "Decryptor" top-level outcome.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    /// The recipient entry for our own device id is absent; silently
    /// skipped per §4.G step 1.
    #[error("This message was not addressed to our device.")]
    NotForUs,
    /// A pre-key message arrived but we have no session state for the
    /// sending device.
    #[error("No session exists for {0} and a pre-key was not indicated.")]
    NoSession(Device),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
