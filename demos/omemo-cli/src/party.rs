// omemo-cli
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use omemo_core::config::OmemoConfig;
use omemo_core::models::{DeviceId, IdentityKeyPair, OneTimePreKey, SignedPreKey, UserId};
use omemo_core::test_support::InMemoryKeyStore;
use omemo_core::traits::{CryptoEngine, DynCryptoEngine, DynElementCodec, DynKeyStore, DynPubSub, TrustCallback};
use omemo_core::{BundleService, OmemoCore};
use omemo_signal::{SignalCryptoEngine, SignalSessionEngine};
use omemo_xmpp::{HintOptions, XmppConnection, XmppElementCodec, XmppPubSub};

use crate::network::{LoopbackTransport, Network};

const INITIAL_PRE_KEY_POOL: u32 = 20;

/// Prints every undecided device to stdout; the actual trust decision is
/// driven from `main`'s scripted flow rather than from this callback, since
/// `TrustCallback` is explicitly fire-and-forget per its own doc comment.
struct PrintingTrustCallback {
    label: &'static str,
}

impl TrustCallback for PrintingTrustCallback {
    fn on_undecided_device(&self, device: &omemo_core::models::Device, fingerprint: &str) {
        println!(
            "[{}] device {device} has no trust decision yet (fingerprint {fingerprint})",
            self.label
        );
    }
}

/// One in-process party: its own key material, a real `SignalCryptoEngine`/
/// `SignalSessionEngine`, and the `omemo-xmpp` wire layer bridged over
/// [`LoopbackTransport`]. `key_store`/`pubsub`/`codec` stay directly
/// reachable so the demo can fetch a peer's bundle, learn their identity
/// key, and record a trust decision exactly as a host application's UI
/// layer would — `OmemoCore` itself never does this on the caller's behalf
/// (§4.H gates before any bundle is ever touched).
pub struct Party {
    pub label: &'static str,
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub key_store: Arc<InMemoryKeyStore>,
    pub pubsub: Arc<XmppPubSub<LoopbackTransport>>,
    pub codec: Arc<XmppElementCodec>,
    pub core: OmemoCore,
    pub connection: XmppConnection<LoopbackTransport>,
    pub inbox: tokio::sync::mpsc::UnboundedReceiver<minidom::Element>,
}

impl Party {
    /// First-run provisioning (identity key pair, first signed pre-key, a
    /// one-time pre-key pool) plus wiring of a fresh [`OmemoCore`]. A real
    /// client performs this once per device and persists the result;
    /// `InMemoryKeyStore` means this demo repeats it on every run.
    pub async fn bootstrap(
        label: &'static str,
        user_id: UserId,
        device_id: DeviceId,
        network: Arc<Network>,
    ) -> anyhow::Result<Self> {
        let bare = user_id.as_bare_jid().clone();

        let key_store: Arc<InMemoryKeyStore> = Arc::new(InMemoryKeyStore::new());
        let crypto: DynCryptoEngine = Arc::new(SignalCryptoEngine::new());
        provision_identity(&crypto, &key_store).await?;

        let pubsub = Arc::new(XmppPubSub::new(LoopbackTransport::new(
            bare.clone(),
            Arc::clone(&network),
        )));
        let codec = Arc::new(XmppElementCodec::new());

        let dyn_key_store: DynKeyStore = key_store.clone();
        let dyn_pubsub: DynPubSub = pubsub.clone();
        let dyn_codec: DynElementCodec = codec.clone();

        let bundle_service = Arc::new(BundleService::new(
            dyn_key_store.clone(),
            crypto.clone(),
            dyn_pubsub.clone(),
            dyn_codec.clone(),
            OmemoConfig::default(),
        ));
        let session_engine: omemo_core::traits::DynSessionEngine =
            Arc::new(SignalSessionEngine::new(dyn_key_store.clone(), bundle_service));

        let core = OmemoCore::new(
            user_id.clone(),
            dyn_key_store,
            crypto,
            session_engine,
            dyn_pubsub,
            dyn_codec,
            OmemoConfig::default(),
        );
        core.install_trust_callback(Arc::new(PrintingTrustCallback { label }))
            .map_err(anyhow::Error::from)?;
        core.initialize(device_id).await?;

        let connection = XmppConnection::new(
            LoopbackTransport::new(bare.clone(), Arc::clone(&network)),
            HintOptions::from_config(&OmemoConfig::default()),
        );

        let inbox = network.register(bare);

        Ok(Self {
            label,
            user_id,
            device_id,
            key_store,
            pubsub,
            codec,
            core,
            connection,
            inbox,
        })
    }
}

async fn provision_identity(
    crypto: &DynCryptoEngine,
    key_store: &Arc<InMemoryKeyStore>,
) -> anyhow::Result<()> {
    use omemo_core::traits::KeyStore;

    let identity: IdentityKeyPair = crypto.generate_identity()?;
    key_store.put_identity_key_pair(identity.clone()).await?;

    let (public, private) = crypto.generate_key_pair();
    let signature = crypto.sign(&identity.private, public.as_ref())?;
    let signed_pre_key = SignedPreKey {
        id: 1u32.into(),
        public,
        private,
        signature,
        created_at: unix_now(),
    };
    key_store.put_signed_pre_key(signed_pre_key).await?;

    let pre_keys = (1..=INITIAL_PRE_KEY_POOL)
        .map(|id| {
            let (public, private) = crypto.generate_key_pair();
            OneTimePreKey {
                id: id.into(),
                public,
                private,
            }
        })
        .collect();
    key_store.put_one_time_pre_keys(pre_keys).await?;

    Ok(())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
