// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use tracing::warn;

use crate::error::{CryptoError, DecryptError};
use crate::models::{Device, DecryptedMessage, DeviceId, MessageInfo, OmemoElement, UserId};
use crate::traits::{DynCryptoEngine, DynKeyStore, DynSessionEngine};

const PAYLOAD_KEY_LEN: usize = 16;

/// Consecutive `Corrupted` decrypts from the same peer device before the
/// session is torn down and rebuilt — a deliberate deviation from the
/// source, which never resets automatically (§9).
const CORRUPTION_RESET_THRESHOLD: u32 = 3;

/// §4.G: unwraps the recipient key and decrypts the payload for an inbound
/// `OmemoElement`.
pub struct Decryptor {
    session_engine: DynSessionEngine,
    crypto: DynCryptoEngine,
    key_store: DynKeyStore,
}

impl Decryptor {
    pub fn new(session_engine: DynSessionEngine, crypto: DynCryptoEngine, key_store: DynKeyStore) -> Self {
        Self {
            session_engine,
            crypto,
            key_store,
        }
    }

    pub async fn decrypt(
        &self,
        sender_owner: &UserId,
        own_device_id: DeviceId,
        element: OmemoElement,
        was_carbon: bool,
        was_archive: bool,
    ) -> Result<DecryptedMessage, DecryptError> {
        let sender_device = Device::new(sender_owner.clone(), element.sender_device_id);

        let entry = element
            .keys
            .iter()
            .find(|k| k.recipient_device_id == own_device_id)
            .ok_or(DecryptError::NotForUs)?;

        let decrypt_result = self
            .session_engine
            .decrypt_key(&sender_device, &entry.encrypted_key, entry.is_pre_key)
            .await;

        let unwrapped = match decrypt_result {
            Ok(bytes) => {
                self.reset_corruption_counter(&sender_device).await;
                bytes
            }
            Err(CryptoError::Corrupted(device)) => {
                self.bump_corruption_counter(&device).await;
                return Err(DecryptError::Crypto(CryptoError::Corrupted(device)));
            }
            Err(err @ CryptoError::SkippedOverflow { .. }) => return Err(DecryptError::Crypto(err)),
            Err(CryptoError::AuthFailure(device)) => {
                if !entry.is_pre_key {
                    return Err(DecryptError::NoSession(device));
                }
                return Err(DecryptError::Crypto(CryptoError::AuthFailure(device)));
            }
            Err(err) => return Err(DecryptError::Crypto(err)),
        };

        if unwrapped.len() < PAYLOAD_KEY_LEN {
            return Err(DecryptError::Other(anyhow::anyhow!(
                "Unwrapped key material shorter than expected"
            )));
        }
        let (payload_key, auth_tag) = unwrapped.split_at(PAYLOAD_KEY_LEN);

        let identity = self
            .key_store
            .identity(&sender_device)
            .await
            .map_err(anyhow::Error::from)?;
        let identity_fingerprint = identity
            .map(|key| self.crypto.fingerprint(&key))
            .unwrap_or_default();

        let plaintext = match element.payload {
            Some(ciphertext) => {
                let mut ciphertext_and_tag =
                    Vec::with_capacity(ciphertext.len() + auth_tag.len());
                ciphertext_and_tag.extend_from_slice(&ciphertext);
                ciphertext_and_tag.extend_from_slice(auth_tag);

                let plaintext_bytes = self
                    .crypto
                    .aead_decrypt(payload_key, &element.iv, None, &ciphertext_and_tag)?;
                Some(
                    String::from_utf8(plaintext_bytes)
                        .map_err(|err| DecryptError::Other(anyhow::Error::from(err)))?,
                )
            }
            None => None,
        };

        Ok(DecryptedMessage {
            sender_device,
            plaintext,
            info: MessageInfo {
                identity_fingerprint,
                was_carbon,
                was_archive,
            },
        })
    }

    async fn bump_corruption_counter(&self, device: &Device) {
        let Ok(Some(mut session)) = self.key_store.session(device).await else {
            return;
        };
        session.consecutive_corrupted += 1;

        if session.consecutive_corrupted >= CORRUPTION_RESET_THRESHOLD {
            warn!(
                "{device} produced {} consecutive corrupted messages, resetting session.",
                session.consecutive_corrupted
            );
            if let Err(err) = self.session_engine.reset(device).await {
                warn!("Failed to reset session with {device}: {err}");
            }
            return;
        }

        if let Err(err) = self.key_store.put_session(session).await {
            warn!("Failed to persist corruption counter for {device}: {err}");
        }
    }

    async fn reset_corruption_counter(&self, device: &Device) {
        let Ok(Some(mut session)) = self.key_store.session(device).await else {
            return;
        };
        if session.consecutive_corrupted == 0 {
            return;
        }
        session.consecutive_corrupted = 0;
        if let Err(err) = self.key_store.put_session(session).await {
            warn!("Failed to clear corruption counter for {device}: {err}");
        }
    }
}
