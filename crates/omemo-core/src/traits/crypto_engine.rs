// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::error::CryptoError;
use crate::models::{IdentityKeyPair, PrivateKey, PublicKey};

/// §4.A: the raw cryptographic primitives this engine is built on (AES-GCM,
/// Curve25519, HKDF, HMAC-SHA256) are out of scope; the core only consumes
/// this trait. AES is AES-128-GCM with a 16-byte key and 12-byte IV per the
/// OMEMO v0 (axolotl) profile; implementations may additionally support
/// AES-256 behind a capability flag but are not required to.
#[cfg_attr(feature = "test", mockall::automock)]
pub trait CryptoEngine: Send + Sync {
    fn generate_identity(&self) -> Result<IdentityKeyPair, CryptoError>;

    /// Generates a fresh asymmetric key pair suitable for a signed or
    /// one-time pre-key (§4.A's `generate_prekey`, generalized: both pre-key
    /// kinds share one primitive, only the id namespace differs).
    fn generate_key_pair(&self) -> (PublicKey, PrivateKey);

    fn sign(&self, identity: &PrivateKey, blob: &[u8]) -> Result<Box<[u8]>, CryptoError>;

    /// Verifies `signature` over `blob` under `identity`. Never fails with
    /// `CryptoError` — an invalid signature is a normal `false`, it is the
    /// caller's job (`BundleService::fetch`) to turn that into
    /// `SessionError::BadSignature`.
    fn verify(&self, identity: &PublicKey, blob: &[u8], signature: &[u8]) -> bool;

    fn random(&self, len: usize) -> Vec<u8>;

    /// Encrypts `plaintext` under `(key, iv)`, returning `ciphertext‖tag`
    /// with a 16-byte trailing tag.
    fn aead_encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts `ciphertext‖tag` under `(key, iv)`. Fails on a MAC mismatch;
    /// callers are responsible for mapping that into a device-scoped
    /// [`CryptoError::AuthFailure`].
    fn aead_decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    fn fingerprint(&self, public_key: &PublicKey) -> String {
        public_key.fingerprint()
    }
}
