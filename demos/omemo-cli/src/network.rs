// omemo-cli
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// A minimal in-process stand-in for an XMPP server: PEP-node storage plus
// message delivery between the parties this demo wires up. Not a general
// XMPP implementation — just enough `pubsub`/`pubsub#owner` semantics for
// `omemo-xmpp`'s `XmppConnection`/`XmppPubSub` to drive a real two-party
// OMEMO exchange without a live connection, mirroring the role prose-xmpp's
// `connector::Connection` trait object plays for its own test doubles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jid::BareJid;
use minidom::Element;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use xmpp_parsers::iq::{Iq, IqType};

use omemo_core::error::TransportError;
use omemo_xmpp::RawTransport;

#[derive(Default)]
pub struct Network {
    nodes: RwLock<HashMap<(BareJid, String), Element>>,
    // A bare JID may have more than one device/resource registered (Bob
    // adding a second device in this demo); a stanza addressed to the bare
    // JID fans out to all of them, mirroring how a server delivers to every
    // online resource of an account.
    inboxes: RwLock<HashMap<BareJid, Vec<mpsc::UnboundedSender<Element>>>>,
}

impl Network {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers another inbox for `jid`, returning the receiving half a
    /// party polls for incoming `<message/>` stanzas.
    pub fn register(&self, jid: BareJid) -> mpsc::UnboundedReceiver<Element> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.write().entry(jid).or_default().push(tx);
        rx
    }
}

/// A [`RawTransport`] that delivers directly into a peer's inbox and serves
/// PEP reads/writes from a shared map instead of a socket.
pub struct LoopbackTransport {
    own_jid: BareJid,
    network: Arc<Network>,
}

impl LoopbackTransport {
    pub fn new(own_jid: BareJid, network: Arc<Network>) -> Self {
        Self { own_jid, network }
    }
}

#[async_trait]
impl RawTransport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        true
    }

    fn own_jid(&self) -> Option<BareJid> {
        Some(self.own_jid.clone())
    }

    async fn send_stanza(&self, stanza: Element) -> Result<(), TransportError> {
        let to = stanza
            .attr("to")
            .and_then(|s| s.parse::<BareJid>().ok())
            .ok_or(TransportError::Interrupted)?;

        let inboxes = self.network.inboxes.read();
        if let Some(senders) = inboxes.get(&to) {
            for tx in senders {
                let _ = tx.send(stanza.clone());
            }
        }
        Ok(())
    }

    async fn send_iq(&self, to: Option<BareJid>, iq: Iq) -> Result<Option<Element>, TransportError> {
        let payload = match iq.payload {
            IqType::Get(el) | IqType::Set(el) => el,
            _ => return Err(TransportError::Interrupted),
        };
        if payload.name() != "pubsub" {
            return Err(TransportError::Interrupted);
        }
        let ns = payload.ns();

        if let Some(publish) = payload.get_child("publish", ns.as_str()) {
            let node = publish.attr("node").unwrap_or_default().to_string();
            let item = publish
                .get_child("item", ns.as_str())
                .and_then(|item| item.children().next())
                .cloned();
            if let Some(item) = item {
                self.network
                    .nodes
                    .write()
                    .insert((self.own_jid.clone(), node), item);
            }
            return Ok(None);
        }

        if let Some(items) = payload.get_child("items", ns.as_str()) {
            let node = items.attr("node").unwrap_or_default().to_string();
            let owner = to.unwrap_or_else(|| self.own_jid.clone());
            let Some(found) = self.network.nodes.read().get(&(owner, node.clone())).cloned() else {
                return Ok(None);
            };
            let response = Element::builder("pubsub", ns.as_str())
                .append(
                    Element::builder("items", ns.as_str())
                        .attr("node", node)
                        .append(
                            Element::builder("item", ns.as_str())
                                .attr("id", "current")
                                .append(found)
                                .build(),
                        )
                        .build(),
                )
                .build();
            return Ok(Some(response));
        }

        if let Some(delete) = payload.get_child("delete", ns.as_str()) {
            let node = delete.attr("node").unwrap_or_default().to_string();
            self.network
                .nodes
                .write()
                .remove(&(self.own_jid.clone(), node));
            return Ok(None);
        }

        Err(TransportError::Interrupted)
    }
}
