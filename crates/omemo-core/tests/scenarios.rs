// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// End-to-end scenario tests built entirely on the in-memory test fixtures in
// `test_support` — no network, no real cryptography, just enough fidelity
// to exercise ordering, trust gating, and republish-coalescing behavior.

#![cfg(feature = "test")]

use std::sync::Arc;

use pretty_assertions::assert_eq;

use omemo_core::test_support::{
    FakeCryptoEngine, FakeSessionEngine, InMemoryKeyStore, InMemoryPubSub, RecordingConnection,
};
use omemo_core::traits::{AccessModel, Connection, CryptoEngine, KeyStore, PubSub, TrustCallback};
use omemo_core::{config::OmemoConfig, error, models::*, BundleService, OmemoCore};

fn user(s: &str) -> UserId {
    s.parse().expect("valid bare jid")
}

struct AutoTrustCallback;

impl TrustCallback for AutoTrustCallback {
    fn on_undecided_device(&self, _device: &Device, _fingerprint: &str) {}
}

/// Sets up one identity's full local state (identity key, signed pre-key,
/// one-time pre-key pool) plus a published bundle, returning the pieces a
/// peer needs to establish a session with it.
async fn provision_device(
    key_store: &Arc<InMemoryKeyStore>,
    crypto: &Arc<FakeCryptoEngine>,
    pubsub: &Arc<InMemoryPubSub>,
    device: &Device,
) {
    let identity = crypto.generate_identity().unwrap();
    key_store.put_identity_key_pair(identity.clone()).await.unwrap();

    let (spk_pub, spk_priv) = crypto.generate_key_pair();
    let signature = crypto.sign(&identity.private, spk_pub.as_ref()).unwrap();
    key_store
        .put_signed_pre_key(SignedPreKey {
            id: 1u32.into(),
            public: spk_pub,
            private: spk_priv,
            signature,
            created_at: 0,
        })
        .await
        .unwrap();

    let mut pre_keys = Vec::new();
    for id in 1..=5u32 {
        let (public, private) = crypto.generate_key_pair();
        pre_keys.push(OneTimePreKey {
            id: id.into(),
            public,
            private,
        });
    }
    key_store.put_one_time_pre_keys(pre_keys).await.unwrap();

    let bundle_service = BundleService::new(
        key_store.clone(),
        crypto.clone(),
        pubsub.clone(),
        Arc::new(NoopCodec),
        OmemoConfig::default(),
    );
    bundle_service.publish_self(device.device_id).await.unwrap();
}

/// `ElementCodec` is not exercised by these in-memory scenarios (the
/// in-memory `PubSub`/test fixtures operate on domain types directly), so a
/// minimal pass-through stands in for it.
struct NoopCodec;

impl omemo_core::traits::ElementCodec for NoopCodec {
    fn encode_device_list(&self, list: &DeviceList) -> Vec<u8> {
        list.device_ids.iter().map(|id| u32::from(*id).to_be_bytes()).flatten().collect()
    }

    fn decode_device_list(&self, bytes: &[u8]) -> anyhow::Result<DeviceList> {
        let device_ids = bytes
            .chunks_exact(4)
            .map(|c| DeviceId::from(u32::from_be_bytes(c.try_into().unwrap())))
            .collect::<Vec<_>>();
        let labels = vec![None; device_ids.len()];
        Ok(DeviceList { device_ids, labels })
    }

    fn encode_bundle(&self, _bundle: &Bundle) -> Vec<u8> {
        unimplemented!("bundles are stored as a fixed sentinel by these tests")
    }

    fn decode_bundle(&self, _bytes: &[u8]) -> anyhow::Result<Bundle> {
        unimplemented!("bundles are stored as a fixed sentinel by these tests")
    }

    fn encode_omemo_element(&self, _element: &OmemoElement) -> Vec<u8> {
        unimplemented!()
    }

    fn decode_omemo_element(&self, _bytes: &[u8]) -> anyhow::Result<OmemoElement> {
        unimplemented!()
    }
}

/// BundleService writes through `ElementCodec::encode_bundle`, which the
/// noop codec can't really serialize; `BundleService::fetch` only needs the
/// node to exist, so we seed it with a one-byte sentinel and drive
/// `FakeSessionEngine::ensure_session` (which only checks node presence) for
/// these scenarios instead of calling `BundleService::fetch` directly.
fn seed_bundle_placeholder(pubsub: &InMemoryPubSub, owner: &UserId, device_id: DeviceId) {
    pubsub.seed(
        owner,
        &format!("eu.siacs.conversations.axolotl.bundles:{device_id}"),
        vec![0u8],
    );
}

#[tokio::test]
async fn single_recipient_happy_path_scenario_1() {
    let alice_id = user("alice@example.com");
    let bob_id = user("bob@example.com");
    let alice_device = Device::new(alice_id.clone(), DeviceId::from(1001));
    let bob1 = Device::new(bob_id.clone(), DeviceId::from(2001));
    let bob2 = Device::new(bob_id.clone(), DeviceId::from(2002));

    let key_store = Arc::new(InMemoryKeyStore::new());
    let crypto = Arc::new(FakeCryptoEngine::new());
    let pubsub = Arc::new(InMemoryPubSub::new(alice_id.clone()));

    key_store
        .put_cached_device_list(
            &bob_id,
            CachedDeviceList {
                active: [bob1.device_id, bob2.device_id].into_iter().collect(),
                inactive: Default::default(),
                last_refreshed_at: Some(0),
            },
        )
        .await
        .unwrap();

    for device in [&bob1, &bob2] {
        seed_bundle_placeholder(&pubsub, &device.owner, device.device_id);
        key_store
            .set_trust_state(device, "fp", TrustState::Trusted)
            .await
            .unwrap();
        key_store
            .set_identity(device, crypto.generate_identity().unwrap().public)
            .await
            .unwrap();
    }
    // Re-record trust under the real fingerprint derived from what we just stored.
    for device in [&bob1, &bob2] {
        let identity = key_store.identity(device).await.unwrap().unwrap();
        let fingerprint = crypto.fingerprint(&identity);
        key_store
            .set_trust_state(device, &fingerprint, TrustState::Trusted)
            .await
            .unwrap();
    }

    let session_engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        alice_id.clone(),
        alice_device.device_id,
        1000,
    ));

    let core = OmemoCore::new(
        alice_id.clone(),
        key_store.clone(),
        crypto.clone(),
        session_engine,
        pubsub.clone(),
        Arc::new(NoopCodec),
        OmemoConfig::default(),
    );
    core.install_trust_callback(Arc::new(AutoTrustCallback)).unwrap();
    core.initialize(alice_device.device_id).await.unwrap();

    let element = core
        .encrypt(&[bob_id.clone()], "hello")
        .await
        .expect("encrypt should succeed with both devices trusted");

    assert_eq!(element.sender_device_id, alice_device.device_id);
    assert_eq!(element.iv.len(), 12);
    assert_eq!(element.keys.len(), 2);
    let recipients: std::collections::HashSet<_> =
        element.keys.iter().map(|k| k.recipient_device_id).collect();
    assert_eq!(
        recipients,
        [bob1.device_id, bob2.device_id].into_iter().collect()
    );
    assert!(element.keys.iter().all(|k| k.is_pre_key));
    assert!(element.payload.is_some());
}

#[tokio::test]
async fn undecided_device_aborts_send_scenario_2() {
    let alice_id = user("alice@example.com");
    let bob_id = user("bob@example.com");
    let alice_device = Device::new(alice_id.clone(), DeviceId::from(1001));
    let bob3 = Device::new(bob_id.clone(), DeviceId::from(2003));

    let key_store = Arc::new(InMemoryKeyStore::new());
    let crypto = Arc::new(FakeCryptoEngine::new());
    let pubsub = Arc::new(InMemoryPubSub::new(alice_id.clone()));

    key_store
        .put_cached_device_list(
            &bob_id,
            CachedDeviceList {
                active: [bob3.device_id].into_iter().collect(),
                inactive: Default::default(),
                last_refreshed_at: Some(0),
            },
        )
        .await
        .unwrap();
    // No trust decision ever recorded for bob3: TrustState::Undecided by default.

    let session_engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        alice_id.clone(),
        alice_device.device_id,
        1000,
    ));

    let core = OmemoCore::new(
        alice_id.clone(),
        key_store.clone(),
        crypto.clone(),
        session_engine,
        pubsub.clone(),
        Arc::new(NoopCodec),
        OmemoConfig::default(),
    );
    core.install_trust_callback(Arc::new(AutoTrustCallback)).unwrap();
    core.initialize(alice_device.device_id).await.unwrap();

    let err = core
        .encrypt(&[bob_id.clone()], "hello")
        .await
        .expect_err("an undecided device must abort the send");

    match err {
        error::EncryptError::Undecided(error::UndecidedDevices(devices)) => {
            assert_eq!(devices, vec![bob3]);
        }
        other => panic!("expected Undecided, got {other:?}"),
    }
}

#[tokio::test]
async fn self_sync_excludes_sending_device_scenario_3() {
    let alice_id = user("alice@example.com");
    let bob_id = user("bob@example.com");
    let alice1 = Device::new(alice_id.clone(), DeviceId::from(1001));
    let alice2 = Device::new(alice_id.clone(), DeviceId::from(1002));

    let key_store = Arc::new(InMemoryKeyStore::new());
    let crypto = Arc::new(FakeCryptoEngine::new());
    let pubsub = Arc::new(InMemoryPubSub::new(alice_id.clone()));

    key_store
        .put_cached_device_list(
            &bob_id,
            CachedDeviceList {
                active: Default::default(),
                inactive: Default::default(),
                last_refreshed_at: Some(0),
            },
        )
        .await
        .unwrap();
    key_store
        .put_cached_device_list(
            &alice_id,
            CachedDeviceList {
                active: [alice1.device_id, alice2.device_id].into_iter().collect(),
                inactive: Default::default(),
                last_refreshed_at: Some(0),
            },
        )
        .await
        .unwrap();

    seed_bundle_placeholder(&pubsub, &alice2.owner, alice2.device_id);
    let identity = crypto.generate_identity().unwrap();
    key_store.set_identity(&alice2, identity.public.clone()).await.unwrap();
    let fingerprint = crypto.fingerprint(&identity.public);
    key_store
        .set_trust_state(&alice2, &fingerprint, TrustState::Trusted)
        .await
        .unwrap();

    let session_engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        alice_id.clone(),
        alice1.device_id,
        1000,
    ));

    let core = OmemoCore::new(
        alice_id.clone(),
        key_store.clone(),
        crypto.clone(),
        session_engine,
        pubsub.clone(),
        Arc::new(NoopCodec),
        OmemoConfig::default(),
    );
    core.install_trust_callback(Arc::new(AutoTrustCallback)).unwrap();
    core.initialize(alice1.device_id).await.unwrap();

    let element = core.encrypt(&[bob_id.clone()], "hello").await.unwrap();

    assert_eq!(element.keys.len(), 1);
    assert_eq!(element.keys[0].recipient_device_id, alice2.device_id);
}

#[tokio::test]
async fn device_omitted_republish_is_exactly_once_scenario_5() {
    let alice_id = user("alice@example.com");
    let alice1 = Device::new(alice_id.clone(), DeviceId::from(1001));
    let alice2_id = DeviceId::from(1002);

    let key_store = Arc::new(InMemoryKeyStore::new());
    let crypto = Arc::new(FakeCryptoEngine::new());
    let pubsub = Arc::new(InMemoryPubSub::new(alice_id.clone()));

    let session_engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        alice_id.clone(),
        alice1.device_id,
        1000,
    ));

    let core = Arc::new(OmemoCore::new(
        alice_id.clone(),
        key_store.clone(),
        crypto.clone(),
        session_engine,
        pubsub.clone(),
        Arc::new(NoopCodec),
        OmemoConfig::default(),
    ));
    core.initialize(alice1.device_id).await.unwrap();

    // Simulate several device-list events arriving in quick succession, all
    // omitting 1002.
    for _ in 0..3 {
        core.handle_device_list_event(Some(&alice_id), vec![alice2_id]).await;
    }

    // Give the spawned republish tasks a chance to run.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let cached = key_store.cached_device_list(&alice_id).await.unwrap();
    assert!(cached.active.contains(&alice1.device_id));
    assert!(cached.active.contains(&alice2_id));
}

#[tokio::test]
async fn out_of_order_delivery_within_skip_bound_scenario_6() {
    let alice_id = user("alice@example.com");
    let bob_id = user("bob@example.com");
    let alice_device = Device::new(alice_id.clone(), DeviceId::from(1001));
    let bob_device = Device::new(bob_id.clone(), DeviceId::from(2001));

    let key_store = Arc::new(InMemoryKeyStore::new());
    let pubsub = Arc::new(InMemoryPubSub::new(bob_id.clone()));

    seed_bundle_placeholder(&pubsub, &alice_device.owner, alice_device.device_id);

    let bob_session_engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        bob_id.clone(),
        bob_device.device_id,
        1000,
    ));

    // Bob sends three messages to Alice (from Bob's perspective, Alice is
    // the "peer"); we only need the engine's send side here.
    let m1 = bob_session_engine
        .encrypt_key(&alice_device, b"key-material-1-padded-to-16byte")
        .await
        .unwrap();
    let m2 = bob_session_engine
        .encrypt_key(&alice_device, b"key-material-2-padded-to-16byte")
        .await
        .unwrap();
    let m3 = bob_session_engine
        .encrypt_key(&alice_device, b"key-material-3-padded-to-16byte")
        .await
        .unwrap();

    // Delivered out of order: M2, M3, M1.
    let d2 = bob_session_engine
        .decrypt_key(&bob_device, &m2.encrypted_key, m2.is_pre_key)
        .await
        .unwrap();
    let d3 = bob_session_engine
        .decrypt_key(&bob_device, &m3.encrypted_key, m3.is_pre_key)
        .await
        .unwrap();
    let d1 = bob_session_engine
        .decrypt_key(&bob_device, &m1.encrypted_key, m1.is_pre_key)
        .await
        .unwrap();

    assert_eq!(d1, b"key-material-1-padded-to-16byte");
    assert_eq!(d2, b"key-material-2-padded-to-16byte");
    assert_eq!(d3, b"key-material-3-padded-to-16byte");
}

#[tokio::test]
async fn skip_overflow_boundary() {
    let bob_id = user("bob@example.com");
    let alice_id = user("alice@example.com");
    let bob_device = Device::new(bob_id.clone(), DeviceId::from(2001));
    let alice_device = Device::new(alice_id.clone(), DeviceId::from(1001));

    let key_store = Arc::new(InMemoryKeyStore::new());
    let pubsub = Arc::new(InMemoryPubSub::new(bob_id.clone()));
    seed_bundle_placeholder(&pubsub, &alice_device.owner, alice_device.device_id);

    let engine = Arc::new(FakeSessionEngine::new(
        key_store.clone(),
        pubsub.clone(),
        bob_id.clone(),
        bob_device.device_id,
        3,
    ));

    for _ in 0..=4u32 {
        engine.encrypt_key(&alice_device, b"0123456789abcdef").await.unwrap();
    }

    let overflowing_wrapped = 4u64.to_be_bytes();
    let result = engine
        .decrypt_key(&bob_device, &overflowing_wrapped, true)
        .await;

    assert!(matches!(
        result,
        Err(error::CryptoError::SkippedOverflow { max_skip: 3, .. })
    ));
}
