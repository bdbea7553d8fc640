// omemo-xmpp
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// Adapts a plain stanza/IQ transport into the `Connection` and `PubSub`
// capabilities omemo-core consumes (spec.md §1). `RawTransport` is the
// minimal seam: fire-and-forget stanza delivery plus one IQ round-trip,
// grounded on prose-xmpp's `connector::Connection::send_stanza` and
// `ModuleContext::send_iq`. An integrator who already has a full XMPP
// stack (prose-xmpp, tokio-xmpp, …) implements `RawTransport` against it;
// everything XML-shaped from there down — pubsub publish/items/retract
// IQs, the `message`/`encrypted` wrapper, hint elements — lives here,
// grounded on prose-xmpp's `mods::{omemo, pubsub}`.

use async_trait::async_trait;
use jid::BareJid;
use minidom::Element;
use xmpp_parsers::iq::{Iq, IqType};
use xmpp_parsers::pubsub::pubsub::{Item, Items, Publish, PublishOptions};
use xmpp_parsers::pubsub::{self, ItemId, NodeName};

use omemo_core::error::TransportError;
use omemo_core::models::{OmemoElement, UserId};
use omemo_core::traits::{AccessModel, Connection, PubSub};

use crate::ns;
use crate::stanza::encrypted;

/// The minimal stanza-transport seam `omemo-xmpp` builds on. Does not
/// itself know about connection lifecycle, authentication or retry —
/// those are explicitly out of scope per spec.md §1; a real
/// implementation typically just forwards into whatever client/connector
/// module the host application already has.
#[async_trait]
pub trait RawTransport: Send + Sync {
    fn is_connected(&self) -> bool;

    fn own_jid(&self) -> Option<BareJid>;

    /// Fire-and-forget delivery (message stanzas, pubsub publish/retract).
    async fn send_stanza(&self, stanza: Element) -> Result<(), TransportError>;

    /// One request/response round trip for an IQ `get`/`set`, returning the
    /// `result` payload element (`None` for an empty/absent item, e.g. an
    /// `item-not-found` pubsub error translated by the implementation).
    async fn send_iq(&self, to: Option<BareJid>, iq: Iq) -> Result<Option<Element>, TransportError>;
}

/// Which of the §6 configuration hints to attach to outbound encrypted
/// messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct HintOptions {
    pub add_omemo_hint_body: bool,
    pub add_mam_storage_hint: bool,
    pub add_eme_hint: bool,
}

impl HintOptions {
    pub fn from_config(config: &omemo_core::config::OmemoConfig) -> Self {
        Self {
            add_omemo_hint_body: config.add_omemo_hint_body,
            add_mam_storage_hint: config.add_mam_storage_hint,
            add_eme_hint: config.add_eme_hint,
        }
    }
}

/// §1/§4.I's `Connection` capability: wraps an already-encrypted
/// `OmemoElement` into a `<message/>` stanza, plus the configured §6
/// hints, and hands it to a [`RawTransport`].
pub struct XmppConnection<T: RawTransport> {
    transport: T,
    hints: HintOptions,
}

impl<T: RawTransport> XmppConnection<T> {
    pub fn new(transport: T, hints: HintOptions) -> Self {
        Self { transport, hints }
    }
}

#[async_trait]
impl<T: RawTransport> Connection for XmppConnection<T> {
    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn own_user_id(&self) -> Option<UserId> {
        self.transport.own_jid().map(UserId::from)
    }

    async fn send_encrypted_message(
        &self,
        to: &UserId,
        element: OmemoElement,
    ) -> Result<(), TransportError> {
        let mut body = Element::builder("message", "jabber:client")
            .attr("to", to.as_bare_jid().to_string())
            .attr("type", "chat")
            .append(encrypted::encode_omemo_element(&element));

        if self.hints.add_omemo_hint_body {
            body = body.append(
                Element::builder("body", "jabber:client")
                    .append("I sent you an OMEMO encrypted message but your client doesn't seem to support that.")
                    .build(),
            );
        }
        if self.hints.add_mam_storage_hint && element.is_key_transport() {
            body = body.append(Element::builder("store", ns::HINTS).build());
        }
        if self.hints.add_eme_hint {
            body = body.append(
                Element::builder("encryption", ns::EME)
                    .attr("namespace", ns::LEGACY_OMEMO)
                    .attr("name", "OMEMO")
                    .build(),
            );
        }

        self.transport.send_stanza(body.build()).await
    }
}

fn access_model_publish_options(access: AccessModel) -> Option<PublishOptions> {
    // `for_private_data`/`for_public_data` are the only two constructors
    // the corpus exercises; `Presence` and `Whitelist` map onto the
    // private-data form until a node-configuration-form round trip (as
    // `request_node_configuration_form` shows) is worth the extra IQ.
    match access {
        AccessModel::Open => Some(PublishOptions::for_public_data(None)),
        AccessModel::Presence | AccessModel::Whitelist => Some(PublishOptions::for_private_data(None)),
    }
}

/// §1/§4.D's `PubSub` capability: PEP node publish/fetch/delete, grounded
/// on prose-xmpp's `mods::pubsub::PubSub` (`Items`/`Retract`/`purge`/IQ
/// `delete`) and `mods::omemo::OMEMO` (item id `"current"`, open access).
pub struct XmppPubSub<T: RawTransport> {
    transport: T,
}

impl<T: RawTransport> XmppPubSub<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: RawTransport> PubSub for XmppPubSub<T> {
    async fn publish(
        &self,
        node: &str,
        item_id: &str,
        payload: Vec<u8>,
        access: AccessModel,
    ) -> Result<(), TransportError> {
        let element: Element = std::str::from_utf8(&payload)
            .map_err(|_| TransportError::Interrupted)?
            .parse()
            .map_err(|_| TransportError::Interrupted)?;

        let iq = Iq::from_set(
            uuid::Uuid::new_v4().to_string(),
            pubsub::PubSub::Publish {
                publish: Publish {
                    node: NodeName(node.to_string()),
                    items: vec![Item(pubsub::Item {
                        id: Some(ItemId(item_id.to_string())),
                        publisher: None,
                        payload: Some(element),
                    })],
                },
                publish_options: access_model_publish_options(access),
            },
        );

        self.transport.send_iq(None, iq).await?;
        Ok(())
    }

    async fn fetch(&self, owner: &UserId, node: &str) -> Result<Option<Vec<u8>>, TransportError> {
        let iq = Iq::from_get(
            uuid::Uuid::new_v4().to_string(),
            pubsub::PubSub::Items(Items::new(node)),
        );

        let Some(response) = self
            .transport
            .send_iq(Some(owner.as_bare_jid().clone()), iq)
            .await?
        else {
            return Ok(None);
        };

        let Ok(pubsub::PubSub::Items(items)) = pubsub::PubSub::try_from(response) else {
            return Ok(None);
        };

        Ok(items
            .items
            .into_iter()
            .next()
            .and_then(|item| item.0.payload)
            .map(|el| el.to_string().into_bytes()))
    }

    async fn delete(&self, node: &str) -> Result<(), TransportError> {
        // §4.D/§4.J's "delete" is node deletion, not item retraction: the
        // pubsub#owner `delete` IQ, grounded verbatim on
        // `mods::pubsub::PubSub::delete_node`.
        let iq = Iq {
            from: None,
            to: None,
            id: uuid::Uuid::new_v4().to_string(),
            payload: IqType::Set(
                Element::builder("pubsub", ns::PUBSUB_OWNER)
                    .append(Element::builder("delete", ns::PUBSUB_OWNER).attr("node", node))
                    .build(),
            ),
        };
        // Ignore item-not-found: deleting an already-absent node is a no-op
        // per the trait contract.
        let _ = self.transport.send_iq(None, iq).await;
        Ok(())
    }
}
