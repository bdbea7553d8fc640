// omemo-cli
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// Wiring example for the omemo-core / omemo-signal / omemo-xmpp stack:
// two in-process parties, Alice (one device) and Bob (two devices, the
// second added mid-run), exchange real OMEMO-encrypted stanzas over an
// in-process loopback transport. No live XMPP connection, no toolchain
// build step — just the actual codec, trust gate, and Double-Ratchet
// session engine this workspace implements, driven the way a real client
// would drive them.

mod network;
mod party;

use std::sync::Arc;

use dialoguer::Confirm;
use minidom::Element;

use omemo_core::error::EncryptError;
use omemo_core::models::{Device, DeviceId, OmemoElement, TrustState, UserId};
use omemo_core::receive_pipeline::ReceiveOrigin;
use omemo_core::traits::{Connection, KeyStore, PubSub};

use network::Network;
use party::Party;

/// Mirrors `omemo-core`'s own private pubsub-node naming convention (§6):
/// neither `bundle_service.rs` nor `registry.rs` exports these constants,
/// since a real client never constructs bundle node names itself — it only
/// ever reads the ids `OmemoCore` hands back. This demo has to build one
/// only because it stands in for a human inspecting a freshly-fetched
/// bundle before any session exists.
fn bundle_node(device_id: DeviceId) -> String {
    format!("eu.siacs.conversations.axolotl.bundles:{device_id}")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let network = Network::new();

    let alice_id: UserId = "alice@example.org".parse()?;
    let bob_id: UserId = "bob@example.org".parse()?;

    let mut alice = Party::bootstrap("alice", alice_id.clone(), DeviceId::from(1001u32), Arc::clone(&network)).await?;
    let mut bob = Party::bootstrap("bob", bob_id.clone(), DeviceId::from(2001u32), Arc::clone(&network)).await?;

    // Alice needs to know which devices bob@example.org has published
    // before `encrypt` can enumerate candidates for it at all.
    alice.core.registry().refresh(&bob_id).await?;

    println!("\n=== Alice sends Bob's first device (2001) a message ===");
    let element = encrypt_with_trust_prompts(&alice, &[bob_id.clone()], "Hello Bob, this is Alice.").await?;
    alice.connection.send_encrypted_message(&bob_id, element).await?;
    deliver_one(&mut bob, &alice_id).await?;

    println!("\n=== Bob replies ===");
    bob.core.registry().refresh(&alice_id).await?;
    let element = encrypt_with_trust_prompts(&bob, &[alice_id.clone()], "Hi Alice, got it!").await?;
    bob.connection.send_encrypted_message(&alice_id, element).await?;
    deliver_one(&mut alice, &bob_id).await?;

    // Bob enrolls a second device. Alice's device list for bob@example.org
    // is now stale; once refreshed, her next send must surface the new
    // device as `UndecidedDevices` (the "undecided gate" scenario) and
    // emit no stanza until it is resolved.
    println!("\n=== Bob adds a second device (2002) ===");
    let mut bob2 = Party::bootstrap("bob (device 2)", bob_id.clone(), DeviceId::from(2002u32), Arc::clone(&network)).await?;
    alice.core.registry().refresh(&bob_id).await?;

    println!("\n=== Alice sends again; device 2002 is undecided ===");
    let element = encrypt_with_trust_prompts(&alice, &[bob_id.clone()], "Still there?").await?;
    alice.connection.send_encrypted_message(&bob_id, element).await?;
    // The loopback network fans an address-by-bare-JID stanza out to both
    // of Bob's registered devices, same as a real server would.
    deliver_one(&mut bob, &alice_id).await?;
    deliver_one(&mut bob2, &alice_id).await?;

    println!("\nDemo complete.");
    Ok(())
}

/// Repeatedly attempts `core.encrypt`, resolving any `UndecidedDevices` it
/// hits by fetching the peer's bundle, learning their identity key and
/// fingerprint, and prompting for a trust decision — exactly what a real
/// client's UI layer does in response to `TrustCallback::on_undecided_device`
/// (§4.H). Gives up after a handful of rounds to avoid looping forever on a
/// peer device whose bundle can't be fetched.
async fn encrypt_with_trust_prompts(
    party: &Party,
    recipients: &[UserId],
    plaintext: &str,
) -> anyhow::Result<OmemoElement> {
    for _ in 0..recipients.len() + 4 {
        match party.core.encrypt(recipients, plaintext).await {
            Ok(element) => return Ok(element),
            Err(EncryptError::Undecided(undecided)) => {
                for device in undecided.0 {
                    resolve_trust(party, &device).await?;
                }
            }
            Err(other) => return Err(other.into()),
        }
    }
    anyhow::bail!("gave up resolving trust after several rounds")
}

async fn resolve_trust(party: &Party, device: &Device) -> anyhow::Result<()> {
    let bytes = party
        .pubsub
        .fetch(&device.owner, &bundle_node(device.device_id))
        .await
        .map_err(anyhow::Error::from)?;
    let Some(bytes) = bytes else {
        anyhow::bail!("no published bundle for {device}, cannot establish trust");
    };
    let bundle = party.codec.decode_bundle_for_device(&bytes, device.device_id)?;
    let fingerprint = bundle.identity_key.fingerprint();
    let display_fingerprint = bundle.identity_key.display_fingerprint();

    party.key_store.set_identity(device, bundle.identity_key).await?;

    let trusted = Confirm::new()
        .with_prompt(format!(
            "[{}] Trust {device} with fingerprint {display_fingerprint}?",
            party.label
        ))
        .default(true)
        .interact()?;

    let state = if trusted { TrustState::Trusted } else { TrustState::Untrusted };
    party.core.trust_gate().set_trust_state(device, &fingerprint, state).await?;
    Ok(())
}

/// Pulls one stanza off `party`'s inbox, decodes its `encrypted` element,
/// and feeds it through `OmemoCore::decrypt`, printing the result.
async fn deliver_one(party: &mut Party, sender: &UserId) -> anyhow::Result<()> {
    let stanza = party
        .inbox
        .recv()
        .await
        .ok_or_else(|| anyhow::anyhow!("inbox closed"))?;
    decode_and_decrypt(party, sender, stanza).await
}

async fn decode_and_decrypt(party: &mut Party, sender: &UserId, stanza: Element) -> anyhow::Result<()> {
    let Some(encrypted) = stanza.children().find(|c| c.name() == "encrypted").cloned() else {
        anyhow::bail!("received stanza without an <encrypted/> element");
    };
    let element = omemo_xmpp::stanza::encrypted::decode_omemo_element(&encrypted)?;

    match party.core.decrypt(sender, element, ReceiveOrigin::Direct).await {
        Ok(Some(message)) => {
            if let Some(plaintext) = &message.plaintext {
                println!(
                    "[{}] decrypted from {}: {plaintext}",
                    party.label, message.sender_device
                );
            } else {
                println!(
                    "[{}] received a key-transport element from {}",
                    party.label, message.sender_device
                );
            }
        }
        Ok(None) => println!("[{}] message was not addressed to this device, ignored", party.label),
        Err(err) => println!("[{}] failed to decrypt: {err}", party.label),
    }
    Ok(())
}
