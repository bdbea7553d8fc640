// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use rand::prelude::SliceRandom;
use tracing::info;

use crate::config::OmemoConfig;
use crate::error::SessionError;
use crate::models::{Bundle, ConsumedBundle, Device, DeviceId};
use crate::traits::{AccessModel, DynCryptoEngine, DynElementCodec, DynKeyStore, DynPubSub};

const BUNDLE_NODE_PREFIX: &str = "eu.siacs.conversations.axolotl.bundles";

fn bundle_node(device_id: DeviceId) -> String {
    format!("{BUNDLE_NODE_PREFIX}:{device_id}")
}

/// §4.D: publishes our own pre-key bundle and consumes peer bundles to
/// bootstrap sessions.
pub struct BundleService {
    key_store: DynKeyStore,
    crypto: DynCryptoEngine,
    pubsub: DynPubSub,
    codec: DynElementCodec,
    config: OmemoConfig,
}

impl BundleService {
    pub fn new(
        key_store: DynKeyStore,
        crypto: DynCryptoEngine,
        pubsub: DynPubSub,
        codec: DynElementCodec,
        config: OmemoConfig,
    ) -> Self {
        Self {
            key_store,
            crypto,
            pubsub,
            codec,
            config,
        }
    }

    /// Builds a bundle from the current identity, signed pre-key, and a
    /// snapshot of the one-time pre-key pool, and publishes it at
    /// `bundles:<own_device_id>` with an `open` access model.
    pub async fn publish_self(&self, own_device_id: DeviceId) -> anyhow::Result<()> {
        let identity = self
            .key_store
            .identity_key_pair()
            .await?
            .ok_or_else(|| anyhow::anyhow!("No local identity key pair provisioned yet"))?;
        let signed_pre_key = self
            .key_store
            .current_signed_pre_key()
            .await?
            .ok_or_else(|| anyhow::anyhow!("No signed pre-key provisioned yet"))?;
        let pre_keys = self.key_store.one_time_pre_keys().await?;

        let bundle = Bundle {
            device_id: own_device_id,
            identity_key: identity.public,
            signed_pre_key: signed_pre_key.into_public(),
            pre_keys: pre_keys.into_iter().map(|k| k.into_public()).collect(),
        };

        info!("Publishing OMEMO bundle for device {own_device_id}…");
        let encoded = self.codec.encode_bundle(&bundle);
        self.pubsub
            .publish(&bundle_node(own_device_id), "current", encoded, AccessModel::Open)
            .await
            .map_err(|err| anyhow::anyhow!(err))?;

        Ok(())
    }

    /// Fetches the peer's bundle and selects one unused one-time pre-key
    /// uniformly at random. This only picks from the *peer's* published pool;
    /// the matching local-side consumption (removing one of *our own*
    /// one-time pre-keys once a peer's pre-key message actually arrives) is
    /// `KeyStoreAdapter`'s `PreKeyStore::remove_pre_key` in `omemo-signal`,
    /// driven by the responder's `decrypt_key`, not by this method.
    pub async fn fetch(&self, peer_device: &Device) -> Result<ConsumedBundle, SessionError> {
        let bytes = self
            .pubsub
            .fetch(&peer_device.owner, &bundle_node(peer_device.device_id))
            .await
            .map_err(anyhow::Error::from)?;

        let Some(bytes) = bytes else {
            return Err(SessionError::NoBundle(peer_device.clone()));
        };

        let bundle = self
            .codec
            .decode_bundle(&bytes)
            .map_err(|_| SessionError::NoBundle(peer_device.clone()))?;

        let valid = self.crypto.verify(
            &bundle.identity_key,
            &bundle.signed_pre_key.public,
            &bundle.signed_pre_key.signature,
        );
        if !valid {
            return Err(SessionError::BadSignature(peer_device.clone()));
        }

        if bundle.pre_keys.is_empty() {
            return Err(SessionError::NoBundle(peer_device.clone()));
        }
        let chosen = bundle
            .pre_keys
            .choose(&mut rand::thread_rng())
            .expect("checked non-empty above")
            .clone();

        Ok(ConsumedBundle {
            device_id: bundle.device_id,
            identity_key: bundle.identity_key,
            signed_pre_key: bundle.signed_pre_key,
            pre_key: chosen,
        })
    }

    /// Generates a new signed pre-key, keeps the previous one for the grace
    /// window (enforced by `KeyStore::rotate_signed_pre_key`), and
    /// republishes.
    pub async fn rotate_signed_prekey(&self, own_device_id: DeviceId) -> anyhow::Result<()> {
        let identity = self
            .key_store
            .identity_key_pair()
            .await?
            .ok_or_else(|| anyhow::anyhow!("No local identity key pair provisioned yet"))?;

        let current = self.key_store.current_signed_pre_key().await?;
        let next_id = current
            .map(|k| u32::from(k.id).wrapping_add(1))
            .unwrap_or(1);

        let (public, private) = self.crypto.generate_key_pair();
        let signature = self.crypto.sign(&identity.private, public.as_ref())?;

        let new_key = crate::models::SignedPreKey {
            id: next_id.into(),
            public,
            private,
            signature,
            created_at: unix_now(),
        };

        self.key_store.rotate_signed_pre_key(new_key).await?;
        self.key_store.set_signed_pre_key_id(next_id.into()).await?;

        info!("Rotated signed pre-key to id {next_id}, republishing bundle.");
        self.publish_self(own_device_id).await?;

        Ok(())
    }

    /// Republishes if the pool has dropped below the low-water mark, topping
    /// back up to the target size.
    pub async fn replenish_pre_keys_if_needed(&self, own_device_id: DeviceId) -> anyhow::Result<()> {
        let existing = self.key_store.one_time_pre_keys().await?;
        if existing.len() as u32 >= self.config.prekey_pool_low_water {
            return Ok(());
        }

        let existing_ids: std::collections::HashSet<u32> =
            existing.iter().map(|k| u32::from(k.id)).collect();
        let mut next_id = 1u32;
        let mut generated = Vec::new();

        while existing.len() as u32 + generated.len() as u32 < self.config.prekey_pool_target {
            while existing_ids.contains(&next_id) {
                next_id += 1;
            }
            let (public, private) = self.crypto.generate_key_pair();
            generated.push(crate::models::OneTimePreKey {
                id: next_id.into(),
                public,
                private,
            });
            next_id += 1;
        }

        if generated.is_empty() {
            return Ok(());
        }

        info!("Replenishing one-time pre-key pool with {} keys.", generated.len());
        self.key_store.put_one_time_pre_keys(generated).await?;
        self.publish_self(own_device_id).await?;

        Ok(())
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
