// omemo-signal
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{AeadCore, Aes128Gcm, KeyInit};
use rand::RngCore;

use omemo_core::error::CryptoError;
use omemo_core::models::{IdentityKeyPair, PrivateKey, PublicKey};
use omemo_core::traits::CryptoEngine;

/// §4.A backed by `libsignal-protocol`'s Curve25519 primitives for
/// identity/pre-key generation and signing, and `aes-gcm` directly for the
/// payload AEAD — the same split the teacher uses: `libsignal-protocol`
/// never sees the message payload, only the per-device wrapped key
/// (`encryption_domain_service.rs`'s own `Aes128Gcm` usage for `encrypt_message`
/// / `_decrypt_message`).
#[derive(Default)]
pub struct SignalCryptoEngine;

impl SignalCryptoEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CryptoEngine for SignalCryptoEngine {
    fn generate_identity(&self) -> Result<IdentityKeyPair, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        let pair = libsignal_protocol::IdentityKeyPair::generate(&mut rng);
        Ok(IdentityKeyPair {
            public: PublicKey::from(pair.identity_key().public_key().serialize().as_ref()),
            private: PrivateKey::from(pair.private_key().serialize().as_ref()),
        })
    }

    fn generate_key_pair(&self) -> (PublicKey, PrivateKey) {
        let mut rng = rand::rngs::OsRng;
        let pair = libsignal_protocol::KeyPair::generate(&mut rng);
        (
            PublicKey::from(pair.public_key.serialize().as_ref()),
            PrivateKey::from(pair.private_key.serialize().as_ref()),
        )
    }

    fn sign(&self, identity: &PrivateKey, blob: &[u8]) -> Result<Box<[u8]>, CryptoError> {
        let mut rng = rand::rngs::OsRng;
        let private_key = libsignal_protocol::PrivateKey::deserialize(identity.as_ref())
            .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?;
        let signature = private_key
            .calculate_signature(blob, &mut rng)
            .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?;
        Ok(signature)
    }

    fn verify(&self, identity: &PublicKey, blob: &[u8], signature: &[u8]) -> bool {
        let Ok(public_key) = libsignal_protocol::PublicKey::deserialize(identity.as_ref()) else {
            return false;
        };
        public_key.verify_signature(blob, signature).unwrap_or(false)
    }

    fn random(&self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        bytes
    }

    fn aead_encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?;
        let nonce = aes_gcm::Nonce::<<Aes128Gcm as AeadCore>::NonceSize>::from_slice(iv);
        cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: aad.unwrap_or(&[]),
                },
            )
            .map_err(|err| CryptoError::Other(anyhow::anyhow!("AEAD encryption failed: {err}")))
    }

    fn aead_decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?;
        let nonce = aes_gcm::Nonce::<<Aes128Gcm as AeadCore>::NonceSize>::from_slice(iv);
        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext_and_tag,
                    aad: aad.unwrap_or(&[]),
                },
            )
            // The caller maps this into a device-scoped `AuthFailure`; we
            // can't attach a `Device` here since the engine is device-agnostic.
            .map_err(|err| CryptoError::Other(anyhow::anyhow!("AEAD authentication failed: {err}")))
    }
}
