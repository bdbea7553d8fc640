// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt::{Debug, Formatter};

use base64::{engine::general_purpose, Engine as _};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// An opaque asymmetric public key. Never logged in full; [`Debug`] prints
/// its base64 form, which is acceptable because public keys are not secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(Box<[u8]>);

/// An opaque asymmetric private key. [`Debug`] deliberately redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(Box<[u8]>);

impl From<&[u8]> for PublicKey {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&[u8]> for PrivateKey {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PrivateKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PublicKey({})",
            general_purpose::STANDARD.encode(self.0.as_ref())
        )
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

impl PublicKey {
    /// The compact lowercase-hex fingerprint used for trust lookups, per §3
    /// and §4.H: 64 hex characters, no separators.
    pub fn fingerprint(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// A grouped rendering for human display only: the Signal key-type
    /// prefix byte is skipped and the remaining bytes are grouped into
    /// 4-hex-digit words. Never used for equality or trust comparisons.
    pub fn display_fingerprint(&self) -> String {
        self.0
            .iter()
            .skip(1)
            .map(|b| format!("{:02x}", b))
            .chunks(4)
            .into_iter()
            .map(|word| word.collect::<String>())
            .join(" ")
    }
}

/// Long-term asymmetric identity key pair for one device, per §3.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityKeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl IdentityKeyPair {
    pub fn fingerprint(&self) -> String {
        self.public.fingerprint()
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreKeyId(u32);

impl From<u32> for PreKeyId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PreKeyId> for u32 {
    fn from(value: PreKeyId) -> Self {
        value.0
    }
}

impl AsRef<u32> for PreKeyId {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedPreKeyId(u32);

impl From<u32> for SignedPreKeyId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<SignedPreKeyId> for u32 {
    fn from(value: SignedPreKeyId) -> Self {
        value.0
    }
}

impl AsRef<u32> for SignedPreKeyId {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

/// A single-use pre-key, per §3. Consumed atomically with session creation
/// (invariant 4).
#[derive(Clone, Debug)]
pub struct OneTimePreKey {
    pub id: PreKeyId,
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl OneTimePreKey {
    pub fn into_public(self) -> PublicOneTimePreKey {
        PublicOneTimePreKey {
            id: self.id,
            public: self.public,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublicOneTimePreKey {
    pub id: PreKeyId,
    pub public: PublicKey,
}

/// Rotated every 7-14 days; the previous generation is kept for the grace
/// period (invariant 5).
#[derive(Clone)]
pub struct SignedPreKey {
    pub id: SignedPreKeyId,
    pub public: PublicKey,
    pub private: PrivateKey,
    pub signature: Box<[u8]>,
    /// Unix seconds.
    pub created_at: u64,
}

impl Debug for SignedPreKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedPreKey")
            .field("id", &self.id)
            .field("public", &self.public)
            .field(
                "signature",
                &general_purpose::STANDARD.encode(&self.signature),
            )
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl SignedPreKey {
    pub fn into_public(self) -> PublicSignedPreKey {
        PublicSignedPreKey {
            id: self.id,
            public: self.public,
            signature: self.signature,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublicSignedPreKey {
    pub id: SignedPreKeyId,
    pub public: PublicKey,
    pub signature: Box<[u8]>,
}
