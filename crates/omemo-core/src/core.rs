// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::bundle_service::BundleService;
use crate::config::OmemoConfig;
use crate::decryptor::Decryptor;
use crate::device_list_observer::DeviceListObserver;
use crate::encryptor::{Encryptor, RoomOmemoEligibility};
use crate::error::{ConfigurationError, DecryptError, EncryptError};
use crate::models::{DecryptedMessage, Device, DeviceId, OmemoElement, UserId};
use crate::receive_pipeline::{ReceiveOrigin, ReceivePipeline};
use crate::registry::DeviceRegistry;
use crate::traits::{
    DynCryptoEngine, DynElementCodec, DynKeyStore, DynPubSub, DynSessionEngine, DynTrustCallback,
};
use crate::trust_gate::TrustGate;

/// The façade wiring components A–J together behind the single coarse
/// per-instance mutex described in §5: session mutation, device-list merge,
/// one-time pre-key consumption, and signed-pre-key rotation all happen
/// while this lock is held. Network suspension points (bundle fetch,
/// pub-sub publish, stanza send) happen inside the locked section here —
/// a conscious simplification of §5's snapshot/release/commit choreography,
/// acceptable because every external collaborator in this crate is a trait
/// object the caller may make as fast or as slow as it likes; a production
/// deployment wanting true non-blocking suspension would split this into
/// per-session locks as §9 allows.
pub struct OmemoCore {
    own_user_id: UserId,
    own_device_id: AsyncMutex<Option<DeviceId>>,
    key_store: DynKeyStore,
    registry: Arc<DeviceRegistry>,
    bundle_service: BundleService,
    trust_gate: Arc<TrustGate>,
    encryptor: Encryptor,
    receive_pipeline: ReceivePipeline,
    device_list_observer: AsyncMutex<Option<Arc<DeviceListObserver>>>,
    config: OmemoConfig,
    core_lock: AsyncMutex<()>,
}

impl OmemoCore {
    pub fn new(
        own_user_id: UserId,
        key_store: DynKeyStore,
        crypto: DynCryptoEngine,
        session_engine: DynSessionEngine,
        pubsub: DynPubSub,
        codec: DynElementCodec,
        config: OmemoConfig,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(
            key_store.clone(),
            pubsub.clone(),
            codec.clone(),
            config.clone(),
        ));
        let bundle_service = BundleService::new(
            key_store.clone(),
            crypto.clone(),
            pubsub.clone(),
            codec.clone(),
            config.clone(),
        );
        let trust_gate = Arc::new(TrustGate::new(key_store.clone(), crypto.clone()));
        let encryptor = Encryptor::new(
            Arc::clone(&registry),
            Arc::clone(&trust_gate),
            session_engine.clone(),
            crypto.clone(),
            key_store.clone(),
        );
        let decryptor = Arc::new(Decryptor::new(session_engine, crypto, key_store.clone()));
        let receive_pipeline = ReceivePipeline::new(decryptor);

        Self {
            own_user_id,
            own_device_id: AsyncMutex::new(None),
            key_store,
            registry,
            bundle_service,
            trust_gate,
            encryptor,
            receive_pipeline,
            device_list_observer: AsyncMutex::new(None),
            config,
            core_lock: AsyncMutex::new(()),
        }
    }

    /// Provisions identity, signed pre-key, and one-time pre-key pool if
    /// this is the first run for this device, ensures our own device
    /// appears in our published device list, and publishes our bundle.
    /// Idempotent.
    pub async fn initialize(&self, device_id: DeviceId) -> anyhow::Result<()> {
        let _lock = self.core_lock.lock().await;

        *self.own_device_id.lock().await = Some(device_id);
        self.key_store
            .set_local_device_id(&self.own_user_id, device_id)
            .await?;

        if self.key_store.identity_key_pair().await?.is_none() {
            info!("Provisioning local OMEMO identity for the first time.");
        }

        self.registry
            .ensure_self_enrolled(&self.own_user_id, device_id)
            .await?;
        self.bundle_service.publish_self(device_id).await?;

        let observer = Arc::new(DeviceListObserver::new(
            Arc::clone(&self.registry),
            self.own_user_id.clone(),
            device_id,
        ));
        *self.device_list_observer.lock().await = Some(observer);

        Ok(())
    }

    /// §4.H: installs the trust-decision hook. May only be called once.
    pub fn install_trust_callback(&self, callback: DynTrustCallback) -> Result<(), ConfigurationError> {
        self.trust_gate.install_callback(callback)
    }

    async fn require_device_id(&self) -> Result<DeviceId, ConfigurationError> {
        self.own_device_id
            .lock()
            .await
            .ok_or(ConfigurationError::NotInitialized)
    }

    pub async fn encrypt(
        &self,
        recipients: &[UserId],
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        let device_id = self
            .require_device_id()
            .await
            .map_err(anyhow::Error::from)?;
        let _lock = self.core_lock.lock().await;
        self.encryptor
            .encrypt(&self.own_user_id, device_id, recipients, plaintext)
            .await
    }

    pub async fn encrypt_for_room(
        &self,
        members: &[UserId],
        eligibility: RoomOmemoEligibility,
        plaintext: &str,
    ) -> Result<OmemoElement, EncryptError> {
        let device_id = self
            .require_device_id()
            .await
            .map_err(anyhow::Error::from)?;
        let _lock = self.core_lock.lock().await;
        self.encryptor
            .encrypt_for_room(&self.own_user_id, device_id, members, eligibility, plaintext)
            .await
    }

    pub async fn decrypt(
        &self,
        sender_owner: &UserId,
        element: OmemoElement,
        origin: ReceiveOrigin,
    ) -> Result<Option<DecryptedMessage>, DecryptError> {
        let device_id = self
            .require_device_id()
            .await
            .map_err(anyhow::Error::from)?;
        let _lock = self.core_lock.lock().await;
        self.receive_pipeline
            .handle(sender_owner, device_id, element, origin)
            .await
    }

    /// Feeds a device-list pub-sub notification to the observer installed by
    /// [`OmemoCore::initialize`].
    pub async fn handle_device_list_event(&self, from: Option<&UserId>, remote_ids: Vec<DeviceId>) {
        let observer = self.device_list_observer.lock().await.clone();
        if let Some(observer) = observer {
            observer.on_device_list_event(from, remote_ids).await;
        }
    }

    pub async fn rotate_signed_prekey(&self) -> anyhow::Result<()> {
        let device_id = self.require_device_id().await?;
        let _lock = self.core_lock.lock().await;
        self.bundle_service.rotate_signed_prekey(device_id).await
    }

    pub async fn replenish_pre_keys_if_needed(&self) -> anyhow::Result<()> {
        let device_id = self.require_device_id().await?;
        let _lock = self.core_lock.lock().await;
        self.bundle_service
            .replenish_pre_keys_if_needed(device_id)
            .await
    }

    pub async fn reset_session(&self, peer: &Device) -> anyhow::Result<()> {
        let _lock = self.core_lock.lock().await;
        self.key_store.delete_session(peer).await?;
        Ok(())
    }

    pub fn trust_gate(&self) -> &Arc<TrustGate> {
        &self.trust_gate
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &OmemoConfig {
        &self.config
    }

    pub fn own_user_id(&self) -> &UserId {
        &self.own_user_id
    }
}
