// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use async_trait::async_trait;

use crate::error::{CryptoError, IdentityError};
use crate::models::{
    CachedDeviceList, Device, DeviceId, IdentityKeyPair, OneTimePreKey, PreKeyId, PublicKey,
    Session, SignedPreKey, SignedPreKeyId, TrustState, UserId,
};

/// §4.B: persistence for everything in §3's data model. All operations are
/// synchronous from the caller's perspective (the trait is `async` only so
/// implementations may do real I/O) and must be durable on return — no
/// partial writes may be observed after a `put_*` returns `Ok`.
#[cfg_attr(feature = "test", mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn local_device_id(&self, owner: &UserId) -> Result<Option<DeviceId>, IdentityError>;
    async fn set_local_device_id(
        &self,
        owner: &UserId,
        device_id: DeviceId,
    ) -> Result<(), IdentityError>;

    async fn identity_key_pair(&self) -> Result<Option<IdentityKeyPair>, IdentityError>;
    async fn put_identity_key_pair(&self, pair: IdentityKeyPair) -> Result<(), IdentityError>;

    async fn current_signed_pre_key(&self) -> Result<Option<SignedPreKey>, IdentityError>;
    async fn previous_signed_pre_key(&self) -> Result<Option<SignedPreKey>, IdentityError>;
    async fn put_signed_pre_key(&self, key: SignedPreKey) -> Result<(), IdentityError>;
    /// Invariant 5: at most two generations are concurrently accepted. The
    /// store enforces this by discarding anything older than "previous"
    /// when a new key is installed.
    async fn rotate_signed_pre_key(&self, new_key: SignedPreKey) -> Result<(), IdentityError>;

    async fn one_time_pre_keys(&self) -> Result<Vec<OneTimePreKey>, IdentityError>;
    async fn put_one_time_pre_keys(&self, keys: Vec<OneTimePreKey>) -> Result<(), IdentityError>;
    /// Invariant 4: a one-time pre-key is consumed atomically with session
    /// creation. Implementations must ensure a concurrent call never
    /// returns the same id twice.
    async fn consume_one_time_pre_key(
        &self,
        id: PreKeyId,
    ) -> Result<Option<OneTimePreKey>, IdentityError>;

    async fn session(&self, peer: &Device) -> Result<Option<Session>, CryptoError>;
    /// Invariant 3: a partially-initialized session must never reach this
    /// method; callers are responsible for only persisting a session once
    /// it is present-and-usable or explicitly `Terminated`.
    async fn put_session(&self, session: Session) -> Result<(), CryptoError>;
    async fn delete_session(&self, peer: &Device) -> Result<(), CryptoError>;
    async fn sessions_for_owner(&self, owner: &UserId) -> Result<Vec<Session>, CryptoError>;

    async fn cached_device_list(&self, owner: &UserId) -> Result<CachedDeviceList, IdentityError>;
    async fn put_cached_device_list(
        &self,
        owner: &UserId,
        list: CachedDeviceList,
    ) -> Result<(), IdentityError>;

    /// Invariant 2: once a fingerprint is known for `(owner, device_id)` a
    /// trust entry must exist; `trust_state` returns `Undecided` for any
    /// tuple that has never been recorded, satisfying that invariant without
    /// requiring an explicit insert on first sight.
    async fn trust_state(&self, device: &Device, fingerprint: &str) -> Result<TrustState, IdentityError>;
    async fn set_trust_state(
        &self,
        device: &Device,
        fingerprint: &str,
        trust: TrustState,
    ) -> Result<(), IdentityError>;

    async fn identity(&self, device: &Device) -> Result<Option<PublicKey>, IdentityError>;
    async fn set_identity(&self, device: &Device, identity: PublicKey) -> Result<(), IdentityError>;

    async fn last_rotation_timestamp(&self) -> Result<Option<u64>, IdentityError>;
    async fn set_last_rotation_timestamp(&self, timestamp: u64) -> Result<(), IdentityError>;

    async fn set_signed_pre_key_id(&self, id: SignedPreKeyId) -> Result<(), IdentityError>;
}
