// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use parking_lot::Mutex;
use tracing::info;

use crate::error::{ConfigurationError, GateError, UndecidedDevices};
use crate::models::{Device, TrustState};
use crate::traits::{DynCryptoEngine, DynKeyStore, DynTrustCallback};

/// §4.H: resolves each candidate device's trust state before any ciphertext
/// is produced.
pub struct TrustGate {
    key_store: DynKeyStore,
    crypto: DynCryptoEngine,
    callback: Mutex<Option<DynTrustCallback>>,
}

impl TrustGate {
    pub fn new(key_store: DynKeyStore, crypto: DynCryptoEngine) -> Self {
        Self {
            key_store,
            crypto,
            callback: Mutex::new(None),
        }
    }

    /// A `TrustCallback` may only be installed once per core instance.
    pub fn install_callback(&self, callback: DynTrustCallback) -> Result<(), ConfigurationError> {
        let mut slot = self.callback.lock();
        if slot.is_some() {
            return Err(ConfigurationError::TrustCallbackAlreadyInstalled);
        }
        *slot = Some(callback);
        Ok(())
    }

    /// Partitions `candidates` into the devices that pass the trust gate,
    /// fetching or learning fingerprints as needed. Returns
    /// `GateError::Undecided` (aborting before any ciphertext) if any
    /// candidate's fingerprint has never been decided — kept as a typed
    /// variant rather than `anyhow::Error` so callers can match on it
    /// instead of it collapsing into a catch-all `Other`.
    pub async fn gate(&self, candidates: Vec<Device>) -> Result<Vec<Device>, GateError> {
        let callback = self
            .callback
            .lock()
            .clone()
            .ok_or(ConfigurationError::NoTrustCallback)?;

        let mut trusted = Vec::with_capacity(candidates.len());
        let mut undecided = Vec::new();

        for device in candidates {
            let Some(identity) = self.key_store.identity(&device).await? else {
                // No identity learned yet for this device (no session and no
                // cached bundle): treat as undecided rather than silently
                // dropping it, so the caller is prompted to establish trust
                // once a session exists.
                undecided.push(device);
                continue;
            };
            let fingerprint = self.crypto.fingerprint(&identity);
            let trust = self.key_store.trust_state(&device, &fingerprint).await?;

            match trust {
                TrustState::Trusted => trusted.push(device),
                TrustState::Untrusted => {
                    info!("Excluding untrusted device {device}.");
                }
                TrustState::Undecided => {
                    callback.on_undecided_device(&device, &fingerprint);
                    undecided.push(device);
                }
            }
        }

        if !undecided.is_empty() {
            return Err(UndecidedDevices(undecided).into());
        }

        Ok(trusted)
    }

    pub async fn trust_state_for(
        &self,
        device: &Device,
        fingerprint: &str,
    ) -> anyhow::Result<TrustState> {
        Ok(self.key_store.trust_state(device, fingerprint).await?)
    }

    pub async fn set_trust_state(
        &self,
        device: &Device,
        fingerprint: &str,
        trust: TrustState,
    ) -> anyhow::Result<()> {
        self.key_store
            .set_trust_state(device, fingerprint, trust)
            .await?;
        Ok(())
    }
}
