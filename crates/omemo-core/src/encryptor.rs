// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tracing::warn;

use crate::error::{CannotEstablish, EncryptError, ProtocolError};
use crate::models::{Device, DeviceId, OmemoElement, UserId};
use crate::registry::DeviceRegistry;
use crate::traits::{DynCryptoEngine, DynKeyStore, DynSessionEngine};
use crate::trust_gate::TrustGate;

const PAYLOAD_KEY_LEN: usize = 16;
const AUTH_TAG_LEN: usize = 16;
const IV_LEN: usize = 12;

/// §4.F: builds the outgoing `OmemoElement` for one plaintext message.
pub struct Encryptor {
    registry: Arc<DeviceRegistry>,
    trust_gate: Arc<TrustGate>,
    session_engine: DynSessionEngine,
    crypto: DynCryptoEngine,
    key_store: DynKeyStore,
}

/// Whether group-chat recipients may receive OMEMO at all, per §4.F
/// scenario 4: a room must be both members-only and non-anonymous.
#[derive(Debug, Clone, Copy)]
pub struct RoomOmemoEligibility {
    pub members_only: bool,
    pub non_anonymous: bool,
}

impl RoomOmemoEligibility {
    pub fn is_eligible(&self) -> bool {
        self.members_only && self.non_anonymous
    }
}

impl Encryptor {
    pub fn new(
        registry: Arc<DeviceRegistry>,
        trust_gate: Arc<TrustGate>,
        session_engine: DynSessionEngine,
        crypto: DynCryptoEngine,
        key_store: DynKeyStore,
    ) -> Self {
        Self {
            registry,
            trust_gate,
            session_engine,
            crypto,
            key_store,
        }
    }

    /// Encrypts `plaintext` for every trusted active device of every
    /// `recipient` plus our own other trusted active devices (our own
    /// sending device is always excluded).
    pub async fn encrypt(
        &self,
        own_user_id: &UserId,
        own_device_id: DeviceId,
        recipients: &[UserId],
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        let mut candidates = Vec::new();

        for recipient in recipients {
            candidates.extend(self.registry.active_devices(recipient).await?);
        }

        let own_device = Device::new(own_user_id.clone(), own_device_id);
        candidates.extend(
            self.registry
                .active_devices(own_user_id)
                .await?
                .into_iter()
                .filter(|d| d != &own_device),
        );

        self.encrypt_for_devices(own_device_id, candidates, plaintext)
            .await
    }

    /// Encrypts for a group chat's resolved member set, gated on room
    /// eligibility per scenario 4.
    pub async fn encrypt_for_room(
        &self,
        own_user_id: &UserId,
        own_device_id: DeviceId,
        members: &[UserId],
        eligibility: RoomOmemoEligibility,
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        if !eligibility.is_eligible() {
            return Err(ProtocolError::NoOmemoSupport.into());
        }
        self.encrypt(own_user_id, own_device_id, members, plaintext)
            .await
    }

    /// Retries a send against only the devices that previously succeeded in
    /// `CannotEstablish::successes`, per §4.F's "encrypt-for-existing-sessions"
    /// retry variant.
    pub async fn encrypt_for_existing_sessions(
        &self,
        own_device_id: DeviceId,
        devices: Vec<Device>,
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        self.encrypt_for_devices(own_device_id, devices, plaintext)
            .await
    }

    async fn encrypt_for_devices(
        &self,
        own_device_id: DeviceId,
        candidates: Vec<Device>,
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        let gated = self.trust_gate.gate(candidates).await?;

        let payload_key = self.crypto.random(PAYLOAD_KEY_LEN);
        let iv = self.crypto.random(IV_LEN);

        let sealed = self
            .crypto
            .aead_encrypt(&payload_key, &iv, None, plaintext.as_bytes())?;
        let (ciphertext, auth_tag) = sealed.split_at(sealed.len() - AUTH_TAG_LEN);

        // The auth tag travels with the wrapped key, never with the
        // payload ciphertext (the OMEMO v0 auth-tag framing requirement).
        let mut payload_key_and_tag = Vec::with_capacity(PAYLOAD_KEY_LEN + AUTH_TAG_LEN);
        payload_key_and_tag.extend_from_slice(&payload_key);
        payload_key_and_tag.extend_from_slice(auth_tag);

        let mut successes = Vec::new();
        let mut failures = Vec::new();
        let mut keys = Vec::new();

        for device in gated {
            self.ensure_session(&device).await;

            match self
                .session_engine
                .encrypt_key(&device, &payload_key_and_tag)
                .await
            {
                Ok(wrapped) => {
                    successes.push(device);
                    keys.push(wrapped);
                }
                Err(err) => {
                    warn!("Failed to wrap payload key for {device}: {err}");
                    failures.push((device, anyhow::Error::from(err)));
                }
            }
        }

        // Any failure aborts the whole send without emitting ciphertext — the
        // caller sees exactly who succeeded and may retry against only those
        // devices via `encrypt_for_existing_sessions` (§4.F).
        if !failures.is_empty() {
            return Err(EncryptError::CannotEstablish(CannotEstablish {
                successes,
                failures,
            }));
        }

        if keys.is_empty() {
            return Err(anyhow::anyhow!("No gated recipient devices to encrypt for").into());
        }

        Ok(OmemoElement {
            sender_device_id: own_device_id,
            iv: iv.into_boxed_slice(),
            keys,
            payload: Some(ciphertext.to_vec().into_boxed_slice()),
        })
    }

    async fn ensure_session(&self, device: &Device) {
        if let Ok(Some(session)) = self.key_store.session(device).await {
            if session.is_usable() {
                return;
            }
        }
        if let Err(err) = self.session_engine.ensure_session(device).await {
            warn!("Could not pre-establish session with {device}: {err}");
        }
    }
}
