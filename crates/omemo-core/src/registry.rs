// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config::OmemoConfig;
use crate::error::{IdentityError, TransportError};
use crate::models::{CachedDeviceList, Device, DeviceId, UserId};
use crate::traits::{DynElementCodec, DynKeyStore, DynPubSub};

const DEVICE_LIST_NODE: &str = "eu.siacs.conversations.axolotl.devicelist";

/// §4.C: the authoritative view of which devices are active for an identity,
/// backed by [`crate::traits::KeyStore`] and kept fresh from the
/// `devicelist` PEP node.
pub struct DeviceRegistry {
    key_store: DynKeyStore,
    pubsub: DynPubSub,
    codec: DynElementCodec,
    config: OmemoConfig,
    /// Coalesces concurrent refreshes of the same owner: the first caller
    /// holds the per-owner lock for the duration of the fetch, everyone else
    /// waits on it and then reads the now-fresh cache instead of re-fetching.
    in_flight: AsyncMutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
    /// Wall-clock timestamps are supplied by the caller (see
    /// [`DeviceRegistry::active_devices`]) rather than read from the system
    /// clock here, so the staleness check stays test-friendly.
    last_seen: std::sync::Mutex<HashMap<UserId, Instant>>,
}

impl DeviceRegistry {
    pub fn new(
        key_store: DynKeyStore,
        pubsub: DynPubSub,
        codec: DynElementCodec,
        config: OmemoConfig,
    ) -> Self {
        Self {
            key_store,
            pubsub,
            codec,
            config,
            in_flight: AsyncMutex::new(HashMap::new()),
            last_seen: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the last-known active set for `owner`, triggering a
    /// background refresh if the cache is older than
    /// [`OmemoConfig::stale_threshold`]. Never blocks on the network itself.
    pub async fn active_devices(self: &Arc<Self>, owner: &UserId) -> Result<Vec<Device>, IdentityError> {
        let cached = self.key_store.cached_device_list(owner).await?;

        let is_stale = self
            .last_seen
            .lock()
            .unwrap()
            .get(owner)
            .map(|seen| seen.elapsed() > self.config.stale_threshold)
            .unwrap_or(true);

        if is_stale {
            let this = Arc::clone(self);
            let owner = owner.clone();
            tokio::spawn(async move {
                if let Err(err) = this.refresh(&owner).await {
                    warn!("Background device-list refresh for {owner} failed: {err}");
                }
            });
        }

        Ok(cached
            .active
            .into_iter()
            .map(|device_id| Device::new(owner.clone(), device_id))
            .collect())
    }

    /// Synchronously fetches the published list for `owner` and merges it.
    /// Concurrent refreshes of the same owner coalesce onto a single fetch.
    pub async fn refresh(&self, owner: &UserId) -> anyhow::Result<()> {
        let lock = {
            let mut in_flight = self.in_flight.lock().await;
            Arc::clone(
                in_flight
                    .entry(owner.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let _guard = lock.lock().await;

        let bytes = self.pubsub.fetch(owner, DEVICE_LIST_NODE).await?;
        let Some(bytes) = bytes else {
            return Ok(());
        };
        let list = self.codec.decode_device_list(&bytes)?;

        self.merge(owner, list.device_ids).await?;
        self.last_seen
            .lock()
            .unwrap()
            .insert(owner.clone(), Instant::now());

        Ok(())
    }

    /// Applies a freshly observed set of device ids for `owner`: it becomes
    /// the active set; anything previously active but now absent becomes
    /// inactive and is retained for fingerprint history.
    pub async fn merge(
        &self,
        owner: &UserId,
        remote_ids: impl IntoIterator<Item = DeviceId>,
    ) -> Result<(), IdentityError> {
        let mut cached = self.key_store.cached_device_list(owner).await?;
        cached.merge(remote_ids);
        cached.last_refreshed_at = Some(now_unix());
        self.key_store.put_cached_device_list(owner, cached).await
    }

    /// §4.J/4.C: if a fetched list for our own identity omits our own
    /// device, republish the union. Returns `true` if a republish happened.
    pub async fn ensure_self_enrolled(
        &self,
        own_user_id: &UserId,
        own_device_id: DeviceId,
    ) -> anyhow::Result<bool> {
        let cached = self.key_store.cached_device_list(own_user_id).await?;
        if cached.active.contains(&own_device_id) {
            return Ok(false);
        }

        info!("Own device {own_device_id} missing from published device list, re-enrolling.");

        let mut ids: Vec<DeviceId> = cached.active.iter().copied().collect();
        ids.push(own_device_id);

        let list = crate::models::DeviceList {
            device_ids: ids.clone(),
            labels: vec![None; ids.len()],
        };
        let encoded = self.codec.encode_device_list(&list);
        self.pubsub
            .publish(
                DEVICE_LIST_NODE,
                "current",
                encoded,
                crate::traits::AccessModel::Open,
            )
            .await
            .map_err(|err: TransportError| anyhow::anyhow!(err))?;

        self.merge(own_user_id, ids).await?;

        Ok(true)
    }

    pub async fn cached(&self, owner: &UserId) -> Result<CachedDeviceList, IdentityError> {
        self.key_store.cached_device_list(owner).await
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
