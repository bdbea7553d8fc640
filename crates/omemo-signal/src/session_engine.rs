// omemo-signal
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// `SignalSessionEngine` drives `libsignal-protocol`'s X3DH/Double Ratchet
// implementation from an actor running on a dedicated thread, grounded on
// prose-core-client's `SignalServiceHandle`. The dedicated thread exists
// because libsignal-protocol's store traits are `?Send`:
// - https://github.com/signalapp/libsignal/issues/298
// - https://github.com/whisperfish/libsignal-service-rs/issues/111

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use async_trait::async_trait;
use libsignal_protocol::{CiphertextMessage, PreKeySignalMessage, SignalMessage};
use rand::rngs::OsRng;
use tokio::sync::{mpsc, oneshot};

use omemo_core::error::{CryptoError, SessionError};
use omemo_core::models::{ConsumedBundle, Device, WrappedKey};
use omemo_core::traits::{DynKeyStore, SessionEngine};
use omemo_core::BundleService;

use crate::compat::{protocol_address, to_signal_device_id};
use crate::repo_adapter::KeyStoreAdapter;

enum Command {
    EnsureSession {
        peer: Device,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    EncryptKey {
        peer: Device,
        payload_key: Vec<u8>,
        reply: oneshot::Sender<Result<WrappedKey, SessionError>>,
    },
    DecryptKey {
        sender: Device,
        wrapped: Vec<u8>,
        is_pre_key: bool,
        reply: oneshot::Sender<Result<Vec<u8>, CryptoError>>,
    },
    Reset {
        peer: Device,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
}

struct Actor {
    store: KeyStoreAdapter,
    key_store: DynKeyStore,
    bundle_service: Arc<BundleService>,
}

impl Actor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::EnsureSession { peer, reply } => {
                    let _ = reply.send(self.ensure_session(&peer).await);
                }
                Command::EncryptKey {
                    peer,
                    payload_key,
                    reply,
                } => {
                    let _ = reply.send(self.encrypt_key(&peer, &payload_key).await);
                }
                Command::DecryptKey {
                    sender,
                    wrapped,
                    is_pre_key,
                    reply,
                } => {
                    let _ = reply.send(self.decrypt_key(&sender, &wrapped, is_pre_key).await);
                }
                Command::Reset { peer, reply } => {
                    let _ = reply.send(self.reset(&peer).await);
                }
            }
        }
    }

    async fn ensure_session(&mut self, peer: &Device) -> Result<(), SessionError> {
        let existing = self
            .key_store
            .session(peer)
            .await
            .map_err(|err| SessionError::Other(anyhow::anyhow!(err)))?;
        if existing.map(|session| session.is_usable()).unwrap_or(false) {
            return Ok(());
        }

        let consumed = self.bundle_service.fetch(peer).await?;
        let bundle = to_signal_pre_key_bundle(&consumed)
            .map_err(|err| SessionError::Other(anyhow::anyhow!(err)))?;
        let address = protocol_address(peer);
        let mut rng = OsRng;

        libsignal_protocol::process_prekey_bundle(
            &address,
            &mut self.store.clone(),
            &mut self.store.clone(),
            &bundle,
            SystemTime::now(),
            &mut rng,
        )
        .await
        .map_err(|err| SessionError::Other(anyhow::anyhow!(err)))
    }

    async fn encrypt_key(
        &mut self,
        peer: &Device,
        payload_key: &[u8],
    ) -> Result<WrappedKey, SessionError> {
        let address = protocol_address(peer);
        let ciphertext = libsignal_protocol::message_encrypt(
            payload_key,
            &address,
            &mut self.store,
            &mut self.store,
            SystemTime::now(),
        )
        .await
        .map_err(|err| SessionError::Other(anyhow::anyhow!(err)))?;

        let (is_pre_key, encrypted_key) = match ciphertext {
            CiphertextMessage::SignalMessage(message) => (false, message.serialized().to_vec()),
            CiphertextMessage::PreKeySignalMessage(message) => {
                (true, message.serialized().to_vec())
            }
            CiphertextMessage::SenderKeyMessage(_) | CiphertextMessage::PlaintextContent(_) => {
                return Err(SessionError::Other(anyhow::anyhow!(
                    "unexpected ciphertext message type for a 1:1 session"
                )))
            }
        };

        Ok(WrappedKey {
            recipient_device_id: peer.device_id,
            is_pre_key,
            encrypted_key: encrypted_key.into_boxed_slice(),
        })
    }

    async fn decrypt_key(
        &mut self,
        sender: &Device,
        wrapped: &[u8],
        is_pre_key: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        let address = protocol_address(sender);
        let ciphertext = if is_pre_key {
            CiphertextMessage::PreKeySignalMessage(
                PreKeySignalMessage::try_from(wrapped)
                    .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?,
            )
        } else {
            CiphertextMessage::SignalMessage(
                SignalMessage::try_from(wrapped)
                    .map_err(|err| CryptoError::Other(anyhow::anyhow!(err)))?,
            )
        };

        let mut rng = OsRng;
        libsignal_protocol::message_decrypt(
            &ciphertext,
            &address,
            &mut self.store,
            &mut self.store,
            &mut self.store,
            &mut self.store,
            &mut self.store,
            &mut rng,
        )
        .await
        .map_err(|err| map_decrypt_error(err, sender))
    }

    async fn reset(&mut self, peer: &Device) -> Result<(), SessionError> {
        self.key_store
            .delete_session(peer)
            .await
            .map_err(|err| SessionError::Other(anyhow::anyhow!(err)))
    }
}

/// Heuristic: libsignal-protocol's own error enum doesn't expose a stable,
/// narrow way to distinguish "duplicate/out-of-window message" from "MAC
/// verification failed" from "ratchet state corrupted" at this API surface,
/// so the mapping falls back to matching the error's rendered message. A
/// verified build would tighten this against the exact variant names.
fn map_decrypt_error(err: libsignal_protocol::error::SignalProtocolError, sender: &Device) -> CryptoError {
    let message = err.to_string().to_lowercase();
    if message.contains("duplicate") || message.contains("skip") || message.contains("too far") {
        CryptoError::SkippedOverflow {
            device: sender.clone(),
            max_skip: 0,
        }
    } else if message.contains("mac") || message.contains("auth") || message.contains("untrusted") {
        CryptoError::AuthFailure(sender.clone())
    } else if message.contains("invalid") || message.contains("corrupt") || message.contains("state") {
        CryptoError::Corrupted(sender.clone())
    } else {
        CryptoError::Other(anyhow::anyhow!(err))
    }
}

fn to_signal_pre_key_bundle(
    consumed: &ConsumedBundle,
) -> anyhow::Result<libsignal_protocol::PreKeyBundle> {
    let identity_key = libsignal_protocol::IdentityKey::new(
        libsignal_protocol::PublicKey::deserialize(consumed.identity_key.as_ref())?,
    );
    let signed_pre_key = libsignal_protocol::PublicKey::deserialize(consumed.signed_pre_key.public.as_ref())?;
    let pre_key = consumed
        .pre_key
        .as_ref()
        .map(|key| {
            Ok::<_, anyhow::Error>((
                libsignal_protocol::PreKeyId::from(u32::from(key.id)),
                libsignal_protocol::PublicKey::deserialize(key.public.as_ref())?,
            ))
        })
        .transpose()?;

    Ok(libsignal_protocol::PreKeyBundle::new(
        0,
        to_signal_device_id(consumed.device_id),
        pre_key,
        libsignal_protocol::SignedPreKeyId::from(u32::from(consumed.signed_pre_key.id)),
        signed_pre_key,
        consumed.signed_pre_key.signature.to_vec(),
        identity_key,
    )?)
}

#[derive(Clone)]
pub struct SignalSessionEngine {
    commands: mpsc::UnboundedSender<Command>,
}

impl SignalSessionEngine {
    pub fn new(key_store: DynKeyStore, bundle_service: Arc<BundleService>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let actor = Actor {
            store: KeyStoreAdapter::new(key_store.clone()),
            key_store,
            bundle_service,
        };

        std::thread::Builder::new()
            .name("omemo-signal-actor".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to start the omemo-signal actor runtime");
                let local = tokio::task::LocalSet::new();
                local.spawn_local(actor.run(rx));
                runtime.block_on(local);
            })
            .expect("failed to spawn the omemo-signal actor thread");

        Self { commands: tx }
    }

    async fn dispatch<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, recv) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Other(anyhow::anyhow!("omemo-signal actor has shut down")))?;
        recv.await
            .context("omemo-signal actor dropped a reply")
            .map_err(SessionError::Other)
    }
}

#[async_trait]
impl SessionEngine for SignalSessionEngine {
    async fn ensure_session(&self, peer: &Device) -> Result<(), SessionError> {
        self.dispatch(|reply| Command::EnsureSession {
            peer: peer.clone(),
            reply,
        })
        .await?
    }

    async fn encrypt_key(&self, peer: &Device, payload_key: &[u8]) -> Result<WrappedKey, SessionError> {
        self.dispatch(|reply| Command::EncryptKey {
            peer: peer.clone(),
            payload_key: payload_key.to_vec(),
            reply,
        })
        .await?
    }

    async fn decrypt_key(
        &self,
        sender: &Device,
        wrapped: &[u8],
        is_pre_key: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        let (reply, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::DecryptKey {
                sender: sender.clone(),
                wrapped: wrapped.to_vec(),
                is_pre_key,
                reply,
            })
            .is_err()
        {
            return Err(CryptoError::Other(anyhow::anyhow!(
                "omemo-signal actor has shut down"
            )));
        }
        recv.await
            .map_err(|_| CryptoError::Other(anyhow::anyhow!("omemo-signal actor dropped a reply")))?
    }

    async fn send_ratchet_update(&self, peer: &Device) -> Result<WrappedKey, SessionError> {
        // A ratchet update is just a key-transport message: an empty payload
        // key, encrypted through the normal session so the recipient's
        // ratchet advances without a chat message attached (§4.D).
        self.ensure_session(peer).await?;
        self.encrypt_key(peer, &[]).await
    }

    async fn reset(&self, peer: &Device) -> Result<(), SessionError> {
        self.dispatch(|reply| Command::Reset {
            peer: peer.clone(),
            reply,
        })
        .await?
    }
}
