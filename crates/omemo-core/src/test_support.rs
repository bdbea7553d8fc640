// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// In-memory stand-ins for the external collaborators, used by this crate's
// own scenario tests. Not part of the public API surface consumed by a real
// client — that belongs in a concrete crate backed by real storage/crypto.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{CryptoError, IdentityError, SessionError, TransportError};
use crate::models::{
    CachedDeviceList, Device, DeviceId, IdentityKeyPair, OneTimePreKey, PreKeyId, PrivateKey,
    PublicKey, Session, SignedPreKey, SignedPreKeyId, TrustState, UserId, WrappedKey,
};
use crate::traits::{AccessModel, Connection, KeyStore, PubSub};

/// An in-memory `KeyStore`. All state lives behind `parking_lot::RwLock`s so
/// it can be shared via `Arc` across the components under test without
/// interior mutability boilerplate.
#[derive(Default)]
pub struct InMemoryKeyStore {
    local_device_ids: RwLock<HashMap<UserId, DeviceId>>,
    identity: RwLock<Option<IdentityKeyPair>>,
    current_spk: RwLock<Option<SignedPreKey>>,
    previous_spk: RwLock<Option<SignedPreKey>>,
    one_time_pre_keys: RwLock<HashMap<PreKeyId, OneTimePreKey>>,
    sessions: RwLock<HashMap<Device, Session>>,
    device_lists: RwLock<HashMap<UserId, CachedDeviceList>>,
    trust: RwLock<HashMap<(Device, String), TrustState>>,
    identities: RwLock<HashMap<Device, PublicKey>>,
    last_rotation: RwLock<Option<u64>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn local_device_id(&self, owner: &UserId) -> Result<Option<DeviceId>, IdentityError> {
        Ok(self.local_device_ids.read().get(owner).copied())
    }

    async fn set_local_device_id(&self, owner: &UserId, device_id: DeviceId) -> Result<(), IdentityError> {
        self.local_device_ids.write().insert(owner.clone(), device_id);
        Ok(())
    }

    async fn identity_key_pair(&self) -> Result<Option<IdentityKeyPair>, IdentityError> {
        Ok(self.identity.read().clone())
    }

    async fn put_identity_key_pair(&self, pair: IdentityKeyPair) -> Result<(), IdentityError> {
        *self.identity.write() = Some(pair);
        Ok(())
    }

    async fn current_signed_pre_key(&self) -> Result<Option<SignedPreKey>, IdentityError> {
        Ok(self.current_spk.read().clone())
    }

    async fn previous_signed_pre_key(&self) -> Result<Option<SignedPreKey>, IdentityError> {
        Ok(self.previous_spk.read().clone())
    }

    async fn put_signed_pre_key(&self, key: SignedPreKey) -> Result<(), IdentityError> {
        *self.current_spk.write() = Some(key);
        Ok(())
    }

    async fn rotate_signed_pre_key(&self, new_key: SignedPreKey) -> Result<(), IdentityError> {
        let previous = self.current_spk.write().replace(new_key);
        *self.previous_spk.write() = previous;
        Ok(())
    }

    async fn one_time_pre_keys(&self) -> Result<Vec<OneTimePreKey>, IdentityError> {
        Ok(self.one_time_pre_keys.read().values().cloned().collect())
    }

    async fn put_one_time_pre_keys(&self, keys: Vec<OneTimePreKey>) -> Result<(), IdentityError> {
        let mut store = self.one_time_pre_keys.write();
        for key in keys {
            store.insert(key.id, key);
        }
        Ok(())
    }

    async fn consume_one_time_pre_key(&self, id: PreKeyId) -> Result<Option<OneTimePreKey>, IdentityError> {
        Ok(self.one_time_pre_keys.write().remove(&id))
    }

    async fn session(&self, peer: &Device) -> Result<Option<Session>, CryptoError> {
        Ok(self.sessions.read().get(peer).cloned())
    }

    async fn put_session(&self, session: Session) -> Result<(), CryptoError> {
        self.sessions.write().insert(session.peer.clone(), session);
        Ok(())
    }

    async fn delete_session(&self, peer: &Device) -> Result<(), CryptoError> {
        self.sessions.write().remove(peer);
        Ok(())
    }

    async fn sessions_for_owner(&self, owner: &UserId) -> Result<Vec<Session>, CryptoError> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| &s.peer.owner == owner)
            .cloned()
            .collect())
    }

    async fn cached_device_list(&self, owner: &UserId) -> Result<CachedDeviceList, IdentityError> {
        Ok(self.device_lists.read().get(owner).cloned().unwrap_or_default())
    }

    async fn put_cached_device_list(
        &self,
        owner: &UserId,
        list: CachedDeviceList,
    ) -> Result<(), IdentityError> {
        self.device_lists.write().insert(owner.clone(), list);
        Ok(())
    }

    async fn trust_state(&self, device: &Device, fingerprint: &str) -> Result<TrustState, IdentityError> {
        Ok(self
            .trust
            .read()
            .get(&(device.clone(), fingerprint.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn set_trust_state(
        &self,
        device: &Device,
        fingerprint: &str,
        trust: TrustState,
    ) -> Result<(), IdentityError> {
        self.trust
            .write()
            .insert((device.clone(), fingerprint.to_string()), trust);
        Ok(())
    }

    async fn identity(&self, device: &Device) -> Result<Option<PublicKey>, IdentityError> {
        Ok(self.identities.read().get(device).cloned())
    }

    async fn set_identity(&self, device: &Device, identity: PublicKey) -> Result<(), IdentityError> {
        self.identities.write().insert(device.clone(), identity);
        Ok(())
    }

    async fn last_rotation_timestamp(&self) -> Result<Option<u64>, IdentityError> {
        Ok(*self.last_rotation.read())
    }

    async fn set_last_rotation_timestamp(&self, timestamp: u64) -> Result<(), IdentityError> {
        *self.last_rotation.write() = Some(timestamp);
        Ok(())
    }

    async fn set_signed_pre_key_id(&self, _id: SignedPreKeyId) -> Result<(), IdentityError> {
        Ok(())
    }
}

/// An in-memory PEP-node store: `(owner, node) -> last published payload`.
#[derive(Default)]
pub struct InMemoryPubSub {
    nodes: RwLock<HashMap<(UserId, String), Vec<u8>>>,
    /// The identity whose publishes land under its own JID, since a real PEP
    /// node is always rooted at the publisher's own account.
    publisher: UserId,
}

impl InMemoryPubSub {
    pub fn new(publisher: UserId) -> Self {
        Self {
            nodes: Default::default(),
            publisher,
        }
    }

    /// Seeds a node as if a peer had published it — for tests setting up a
    /// remote bundle/device-list.
    pub fn seed(&self, owner: &UserId, node: &str, payload: Vec<u8>) {
        self.nodes.write().insert((owner.clone(), node.to_string()), payload);
    }
}

#[async_trait]
impl PubSub for InMemoryPubSub {
    async fn publish(
        &self,
        node: &str,
        _item_id: &str,
        payload: Vec<u8>,
        _access: AccessModel,
    ) -> Result<(), TransportError> {
        self.nodes
            .write()
            .insert((self.publisher.clone(), node.to_string()), payload);
        Ok(())
    }

    async fn fetch(&self, owner: &UserId, node: &str) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.nodes.read().get(&(owner.clone(), node.to_string())).cloned())
    }

    async fn delete(&self, node: &str) -> Result<(), TransportError> {
        self.nodes.write().remove(&(self.publisher.clone(), node.to_string()));
        Ok(())
    }
}

/// A `Connection` that records sent elements instead of putting them on a
/// wire.
#[derive(Default)]
pub struct RecordingConnection {
    own_user_id: Option<UserId>,
    sent: RwLock<VecDeque<(UserId, crate::models::OmemoElement)>>,
}

impl RecordingConnection {
    pub fn new(own_user_id: UserId) -> Self {
        Self {
            own_user_id: Some(own_user_id),
            sent: Default::default(),
        }
    }

    pub fn drain_sent(&self) -> Vec<(UserId, crate::models::OmemoElement)> {
        self.sent.write().drain(..).collect()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn is_connected(&self) -> bool {
        true
    }

    fn own_user_id(&self) -> Option<UserId> {
        self.own_user_id.clone()
    }

    async fn send_encrypted_message(
        &self,
        to: &UserId,
        element: crate::models::OmemoElement,
    ) -> Result<(), TransportError> {
        self.sent.write().push_back((to.clone(), element));
        Ok(())
    }
}

/// A deterministic fake Double-Ratchet: no real X3DH, no real AEAD. Each
/// `(own, peer)` pair shares one fixed "ratchet key" derived from an
/// in-memory counter, with a skipped-message map capped at `max_skip`,
/// closely enough modeling the real protocol's observable behavior (ordering
/// sensitivity, skip bound, pre-key-consumption-once) to exercise §8's
/// properties without pulling in a real Double-Ratchet implementation.
pub struct FakeSessionEngine {
    key_store: std::sync::Arc<InMemoryKeyStore>,
    bundles: std::sync::Arc<InMemoryPubSub>,
    own_user_id: UserId,
    own_device_id: DeviceId,
    max_skip: u32,
    /// peer -> next expected send counter
    send_counters: RwLock<HashMap<Device, u64>>,
    /// peer -> (highest contiguous counter decrypted, skipped counters still pending)
    recv_state: RwLock<HashMap<Device, (u64, std::collections::HashSet<u64>)>>,
    /// Messages "in flight": counter -> (payload_key_and_tag). Keyed by
    /// (sender, counter) so any peer can decrypt what was encrypted to them.
    wire: RwLock<HashMap<(Device, u64), Vec<u8>>>,
}

impl FakeSessionEngine {
    pub fn new(
        key_store: std::sync::Arc<InMemoryKeyStore>,
        bundles: std::sync::Arc<InMemoryPubSub>,
        own_user_id: UserId,
        own_device_id: DeviceId,
        max_skip: u32,
    ) -> Self {
        Self {
            key_store,
            bundles,
            own_user_id,
            own_device_id,
            max_skip,
            send_counters: Default::default(),
            recv_state: Default::default(),
            wire: Default::default(),
        }
    }

    fn own_device(&self) -> Device {
        Device::new(self.own_user_id.clone(), self.own_device_id)
    }
}

#[async_trait]
impl crate::traits::SessionEngine for FakeSessionEngine {
    async fn ensure_session(&self, peer: &Device) -> Result<(), SessionError> {
        let existing = self
            .key_store
            .session(peer)
            .await
            .map_err(anyhow::Error::from)?;
        if existing.as_ref().map(|s| s.is_usable()).unwrap_or(false) {
            return Ok(());
        }

        let bundle_node = format!("eu.siacs.conversations.axolotl.bundles:{}", peer.device_id);
        if self
            .bundles
            .nodes
            .read()
            .get(&(peer.owner.clone(), bundle_node))
            .is_none()
        {
            return Err(SessionError::NoBundle(peer.clone()));
        }

        let mut session = crate::models::Session::new(peer.clone());
        session.state = crate::models::SessionState::PendingX3DH;
        self.key_store
            .put_session(session)
            .await
            .map_err(anyhow::Error::from)?;
        Ok(())
    }

    async fn encrypt_key(&self, peer: &Device, payload_key: &[u8]) -> Result<WrappedKey, SessionError> {
        self.ensure_session(peer).await?;

        let mut counters = self.send_counters.write();
        let counter = counters.entry(peer.clone()).or_insert(0);
        let this_counter = *counter;
        *counter += 1;
        drop(counters);

        self.wire
            .write()
            .insert((self.own_device(), this_counter), payload_key.to_vec());

        let session = self
            .key_store
            .session(peer)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or_else(|| SessionError::Other(anyhow::anyhow!("no session after ensure_session")))?;
        let is_pre_key = session.state == crate::models::SessionState::PendingX3DH;

        Ok(WrappedKey {
            recipient_device_id: peer.device_id,
            is_pre_key,
            encrypted_key: this_counter.to_be_bytes().to_vec().into_boxed_slice(),
        })
    }

    async fn decrypt_key(
        &self,
        sender: &Device,
        wrapped: &[u8],
        is_pre_key: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        let counter = u64::from_be_bytes(
            wrapped
                .try_into()
                .map_err(|_| CryptoError::Corrupted(sender.clone()))?,
        );

        if is_pre_key {
            let mut session = self
                .key_store
                .session(sender)
                .await?
                .unwrap_or_else(|| crate::models::Session::new(sender.clone()));
            session.state = crate::models::SessionState::Established;
            self.key_store.put_session(session).await?;
        }

        let mut state = self.recv_state.write();
        let (high_water, skipped) = state.entry(sender.clone()).or_insert((0, Default::default()));

        if counter < *high_water && !skipped.remove(&counter) {
            // Replayed/duplicate delivery of an already-settled counter.
            return Err(CryptoError::Corrupted(sender.clone()));
        }

        if counter >= *high_water {
            let gap = counter - *high_water;
            if gap > self.max_skip as u64 {
                return Err(CryptoError::SkippedOverflow {
                    device: sender.clone(),
                    max_skip: self.max_skip,
                });
            }
            for pending in *high_water..counter {
                skipped.insert(pending);
            }
            *high_water = counter + 1;
        }
        drop(state);

        self.wire
            .read()
            .get(&(sender.clone(), counter))
            .cloned()
            .ok_or(CryptoError::Corrupted(sender.clone()))
    }

    async fn send_ratchet_update(&self, peer: &Device) -> Result<WrappedKey, SessionError> {
        self.encrypt_key(peer, &[]).await
    }

    async fn reset(&self, peer: &Device) -> Result<(), SessionError> {
        self.key_store
            .delete_session(peer)
            .await
            .map_err(anyhow::Error::from)?;
        self.send_counters.write().remove(peer);
        self.recv_state.write().remove(peer);
        Ok(())
    }
}

/// A deterministic, non-cryptographic stand-in for `CryptoEngine`. Keyed
/// XOR in place of AES-GCM and a `DefaultHasher`-derived tag in place of
/// GMAC — enough to exercise tamper-detection and key/iv round-tripping
/// without pulling a real AEAD implementation into this crate's dev-deps.
#[derive(Default)]
pub struct FakeCryptoEngine {
    counter: AtomicU64,
}

impl FakeCryptoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn tag(key: &[u8], iv: &[u8], data: &[u8]) -> [u8; 16] {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        iv.hash(&mut hasher);
        data.hash(&mut hasher);
        let digest = hasher.finish().to_be_bytes();
        let mut tag = [0u8; 16];
        tag[..8].copy_from_slice(&digest);
        tag[8..].copy_from_slice(&digest);
        tag
    }

    fn xor(key: &[u8], iv: &[u8], data: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()] ^ iv[i % iv.len()])
            .collect()
    }
}

impl crate::traits::CryptoEngine for FakeCryptoEngine {
    fn generate_identity(&self) -> Result<IdentityKeyPair, CryptoError> {
        Ok(IdentityKeyPair {
            public: self.random(32).as_slice().into(),
            private: self.random(32).as_slice().into(),
        })
    }

    fn generate_key_pair(&self) -> (PublicKey, PrivateKey) {
        (
            self.random(32).as_slice().into(),
            self.random(32).as_slice().into(),
        )
    }

    fn sign(&self, identity: &PrivateKey, blob: &[u8]) -> Result<Box<[u8]>, CryptoError> {
        let mut hasher = DefaultHasher::new();
        identity.as_ref().hash(&mut hasher);
        blob.hash(&mut hasher);
        Ok(hasher.finish().to_be_bytes().to_vec().into_boxed_slice())
    }

    fn verify(&self, _identity: &PublicKey, _blob: &[u8], _signature: &[u8]) -> bool {
        // The fake signature scheme is not publicly verifiable (it is keyed
        // by the private half); tests that need `BadSignature` coverage
        // inject a corrupted signature directly rather than exercising this
        // engine's `sign`/`verify` pair.
        true
    }

    fn random(&self, len: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(len);
        let mut counter = self.counter.fetch_add(1, Ordering::Relaxed);
        while bytes.len() < len {
            bytes.extend_from_slice(&counter.to_be_bytes());
            counter = counter.wrapping_mul(6364136223846793005).wrapping_add(1);
        }
        bytes.truncate(len);
        bytes
    }

    fn aead_encrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let mut ciphertext = Self::xor(key, iv, plaintext);
        let aad_bytes = aad.unwrap_or(&[]);
        let mut tagged = key.to_vec();
        tagged.extend_from_slice(aad_bytes);
        tagged.extend_from_slice(&ciphertext);
        ciphertext.extend_from_slice(&Self::tag(key, iv, &tagged));
        Ok(ciphertext)
    }

    fn aead_decrypt(
        &self,
        key: &[u8],
        iv: &[u8],
        aad: Option<&[u8]>,
        ciphertext_and_tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext_and_tag.len() < 16 {
            return Err(CryptoError::Other(anyhow::anyhow!("ciphertext too short")));
        }
        let split = ciphertext_and_tag.len() - 16;
        let (ciphertext, tag) = ciphertext_and_tag.split_at(split);

        let aad_bytes = aad.unwrap_or(&[]);
        let mut tagged = key.to_vec();
        tagged.extend_from_slice(aad_bytes);
        tagged.extend_from_slice(ciphertext);
        if Self::tag(key, iv, &tagged) != tag {
            return Err(CryptoError::Other(anyhow::anyhow!(
                "AEAD authentication failed"
            )));
        }

        Ok(Self::xor(key, iv, ciphertext))
    }
}
