// omemo-xmpp
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// minidom/xmpp-parsers-backed wire layer for omemo-core: encodes and
// decodes the `encrypted`, `list` and `bundle` elements from §6, and
// adapts a plain stanza/IQ transport into the `Connection`/`PubSub`
// capabilities the core consumes. The transport itself (TCP, TLS, SASL,
// stanza routing) is out of scope per spec.md §1 and is represented here
// only by the minimal [`transport::RawTransport`] trait an integrator
// implements against whatever XMPP stack they already have.

pub mod codec;
pub mod element_ext;
pub mod ns;
pub mod stanza;
pub mod transport;

pub use codec::XmppElementCodec;
pub use transport::{HintOptions, RawTransport, XmppConnection, XmppPubSub};
