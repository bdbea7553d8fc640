// omemo-signal
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// Bridges `omemo_core::traits::KeyStore` into the store traits
// `libsignal-protocol` expects, grounded on prose-core-client's
// `SignalRepoWrapper`. Kyber pre-keys are stubbed out: the OMEMO v0
// (axolotl) profile this crate targets never negotiates PQXDH, so no
// `KeyStore` method exists to back them.

use async_trait::async_trait;
use libsignal_protocol::error::{Result as SignalResult, SignalProtocolError as SignalError};
use libsignal_protocol::{
    Direction, IdentityKey, IdentityKeyPair, IdentityKeyStore, KyberPreKeyId, KyberPreKeyRecord,
    KyberPreKeyStore, PreKeyId, PreKeyRecord, PreKeyStore, ProtocolAddress, SessionRecord,
    SessionStore, SignedPreKeyId, SignedPreKeyRecord, SignedPreKeyStore,
};

use omemo_core::models::{OneTimePreKey, PreKeyId as OmemoPreKeyId, PrivateKey, PublicKey};
use omemo_core::models::{Session, SessionState, SignedPreKeyId as OmemoSignedPreKeyId};
use omemo_core::traits::DynKeyStore;

use crate::compat::{map_store_error, ProtocolAddressExt};

#[derive(Clone)]
pub struct KeyStoreAdapter {
    key_store: DynKeyStore,
}

impl KeyStoreAdapter {
    pub fn new(key_store: DynKeyStore) -> Self {
        Self { key_store }
    }
}

#[async_trait(?Send)]
impl SessionStore for KeyStoreAdapter {
    async fn load_session(&self, address: &ProtocolAddress) -> SignalResult<Option<SessionRecord>> {
        let device = address.omemo_device()?;
        let session = self
            .key_store
            .session(&device)
            .await
            .map_err(map_store_error)?;
        session
            .and_then(|s| s.data)
            .map(|data| SessionRecord::deserialize(data.as_ref()))
            .transpose()
    }

    async fn store_session(
        &mut self,
        address: &ProtocolAddress,
        record: &SessionRecord,
    ) -> SignalResult<()> {
        let device = address.omemo_device()?;
        let mut session = self
            .key_store
            .session(&device)
            .await
            .map_err(map_store_error)?
            .unwrap_or_else(|| Session::new(device.clone()));
        session.data = Some(record.serialize()?.into());
        if session.state == SessionState::None {
            session.state = SessionState::PendingX3DH;
        }
        self.key_store
            .put_session(session)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl PreKeyStore for KeyStoreAdapter {
    async fn get_pre_key(&self, prekey_id: PreKeyId) -> SignalResult<PreKeyRecord> {
        let id = OmemoPreKeyId::from(u32::from(prekey_id));
        let keys = self
            .key_store
            .one_time_pre_keys()
            .await
            .map_err(map_store_error)?;
        let key = keys
            .into_iter()
            .find(|k| k.id == id)
            .ok_or(SignalError::InvalidPreKeyId)?;
        Ok(PreKeyRecord::new(
            prekey_id,
            &libsignal_protocol::KeyPair::new(
                libsignal_protocol::PublicKey::deserialize(key.public.as_ref())?,
                libsignal_protocol::PrivateKey::deserialize(key.private.as_ref())?,
            ),
        ))
    }

    async fn save_pre_key(&mut self, prekey_id: PreKeyId, record: &PreKeyRecord) -> SignalResult<()> {
        let id = OmemoPreKeyId::from(u32::from(prekey_id));
        let public = PublicKey::from(record.public_key()?.serialize().as_ref());
        let private = PrivateKey::from(record.private_key()?.serialize().as_ref());
        self.key_store
            .put_one_time_pre_keys(vec![OneTimePreKey { id, public, private }])
            .await
            .map_err(map_store_error)
    }

    async fn remove_pre_key(&mut self, prekey_id: PreKeyId) -> SignalResult<()> {
        let id = OmemoPreKeyId::from(u32::from(prekey_id));
        self.key_store
            .consume_one_time_pre_key(id)
            .await
            .map_err(map_store_error)?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl SignedPreKeyStore for KeyStoreAdapter {
    async fn get_signed_pre_key(
        &self,
        signed_prekey_id: SignedPreKeyId,
    ) -> SignalResult<SignedPreKeyRecord> {
        let id = OmemoSignedPreKeyId::from(u32::from(signed_prekey_id));
        for candidate in [
            self.key_store
                .current_signed_pre_key()
                .await
                .map_err(map_store_error)?,
            self.key_store
                .previous_signed_pre_key()
                .await
                .map_err(map_store_error)?,
        ]
        .into_iter()
        .flatten()
        {
            if candidate.id == id {
                return Ok(SignedPreKeyRecord::new(
                    signed_prekey_id,
                    candidate.created_at,
                    &libsignal_protocol::KeyPair::new(
                        libsignal_protocol::PublicKey::deserialize(candidate.public.as_ref())?,
                        libsignal_protocol::PrivateKey::deserialize(candidate.private.as_ref())?,
                    ),
                    candidate.signature.as_ref(),
                ));
            }
        }
        Err(SignalError::InvalidSignedPreKeyId)
    }

    async fn save_signed_pre_key(
        &mut self,
        signed_prekey_id: SignedPreKeyId,
        record: &SignedPreKeyRecord,
    ) -> SignalResult<()> {
        let id = OmemoSignedPreKeyId::from(u32::from(signed_prekey_id));
        let key = omemo_core::models::SignedPreKey {
            id,
            public: PublicKey::from(record.public_key()?.serialize().as_ref()),
            private: PrivateKey::from(record.private_key()?.serialize().as_ref()),
            signature: record.signature()?.into(),
            created_at: record.timestamp()?,
        };
        self.key_store
            .put_signed_pre_key(key)
            .await
            .map_err(map_store_error)
    }
}

#[async_trait(?Send)]
impl IdentityKeyStore for KeyStoreAdapter {
    async fn get_identity_key_pair(&self) -> SignalResult<IdentityKeyPair> {
        let pair = self
            .key_store
            .identity_key_pair()
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| map_store_error("No local identity key pair provisioned yet"))?;
        let identity_key = IdentityKey::new(libsignal_protocol::PublicKey::deserialize(
            pair.public.as_ref(),
        )?);
        let private_key = libsignal_protocol::PrivateKey::deserialize(pair.private.as_ref())?;
        Ok(IdentityKeyPair::new(identity_key, private_key))
    }

    async fn get_local_registration_id(&self) -> SignalResult<u32> {
        // OMEMO has no separate Signal registration id; the device id
        // doubles as the per-device registration id the ratchet math needs.
        Ok(0)
    }

    async fn save_identity(
        &mut self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
    ) -> SignalResult<bool> {
        let device = address.omemo_device()?;
        let existing = self
            .key_store
            .identity(&device)
            .await
            .map_err(map_store_error)?;
        let public = PublicKey::from(identity.public_key().serialize().as_ref());
        let changed = existing.as_ref().map(|e| e != &public).unwrap_or(false);
        self.key_store
            .set_identity(&device, public)
            .await
            .map_err(map_store_error)?;
        Ok(changed)
    }

    async fn is_trusted_identity(
        &self,
        address: &ProtocolAddress,
        identity: &IdentityKey,
        _direction: Direction,
    ) -> SignalResult<bool> {
        // Trust-on-first-use at the ratchet layer: `omemo-core`'s own
        // `TrustGate` is the actual policy boundary (§4.H) and runs before
        // any ciphertext is produced, so this only guards against a peer
        // silently rotating their identity key under an established
        // session.
        let device = address.omemo_device()?;
        let public = PublicKey::from(identity.public_key().serialize().as_ref());
        match self
            .key_store
            .identity(&device)
            .await
            .map_err(map_store_error)?
        {
            Some(known) => Ok(known == public),
            None => Ok(true),
        }
    }

    async fn get_identity(&self, address: &ProtocolAddress) -> SignalResult<Option<IdentityKey>> {
        let device = address.omemo_device()?;
        let identity = self
            .key_store
            .identity(&device)
            .await
            .map_err(map_store_error)?;
        identity
            .map(|key| Ok(IdentityKey::new(libsignal_protocol::PublicKey::deserialize(key.as_ref())?)))
            .transpose()
    }
}

#[async_trait(?Send)]
impl KyberPreKeyStore for KeyStoreAdapter {
    async fn get_kyber_pre_key(&self, _kyber_prekey_id: KyberPreKeyId) -> SignalResult<KyberPreKeyRecord> {
        Err(SignalError::InvalidKyberPreKeyId)
    }

    async fn save_kyber_pre_key(
        &mut self,
        _kyber_prekey_id: KyberPreKeyId,
        _record: &KyberPreKeyRecord,
    ) -> SignalResult<()> {
        Ok(())
    }

    async fn mark_kyber_pre_key_used(&mut self, _kyber_prekey_id: KyberPreKeyId) -> SignalResult<()> {
        Ok(())
    }
}
