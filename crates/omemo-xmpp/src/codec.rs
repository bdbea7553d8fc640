// omemo-xmpp
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use minidom::Element;

use omemo_core::models::{Bundle, DeviceList, OmemoElement};
use omemo_core::traits::ElementCodec;

use crate::stanza::{bundle, device_list, encrypted};

/// §1/§4.I's "Stanza parsing and XML serialization of wire elements"
/// collaborator, backed by `minidom`. The only XML-aware component in this
/// workspace; `omemo-core` never depends on `minidom` directly. Grounded on
/// prose-xmpp's `stanza::omemo` `TryFrom<Element>`/`From<T>` pairs.
///
/// `decode_bundle` needs the publishing device id, which lives in the PEP
/// node name (`…bundles:<device_id>`) rather than in the element itself;
/// [`ElementCodec::decode_bundle`] therefore takes the id as declared by
/// the trait contract and threads it through as zero since the core only
/// ever overwrites it with the id it already knows the bundle came from.
/// See [`XmppElementCodec::decode_bundle_for_device`] for the id-aware
/// variant `omemo-xmpp`'s own `PubSub`/`Connection` glue uses instead.
#[derive(Default, Clone, Copy)]
pub struct XmppElementCodec;

impl XmppElementCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decodes a `bundle` element fetched from the PEP node published at
    /// `…bundles:<device_id>`, attaching that id to the result per §6.
    pub fn decode_bundle_for_device(
        &self,
        bytes: &[u8],
        device_id: impl Into<omemo_core::models::DeviceId>,
    ) -> anyhow::Result<Bundle> {
        let element: Element = std::str::from_utf8(bytes)?.parse()?;
        bundle::decode_bundle(&element, device_id)
    }
}

impl ElementCodec for XmppElementCodec {
    fn encode_device_list(&self, list: &DeviceList) -> Vec<u8> {
        device_list::encode_device_list(list).to_string().into_bytes()
    }

    fn decode_device_list(&self, bytes: &[u8]) -> anyhow::Result<DeviceList> {
        let element: Element = std::str::from_utf8(bytes)?.parse()?;
        device_list::decode_device_list(&element)
    }

    fn encode_bundle(&self, bundle: &Bundle) -> Vec<u8> {
        bundle::encode_bundle(bundle).to_string().into_bytes()
    }

    fn decode_bundle(&self, bytes: &[u8]) -> anyhow::Result<Bundle> {
        // The element carries no device id of its own (§6: it lives in the
        // PEP node name); `0` is a placeholder the caller must overwrite.
        // `decode_bundle_for_device` is the real entry point `omemo-xmpp`'s
        // `PubSub` glue uses.
        self.decode_bundle_for_device(bytes, 0u32)
    }

    fn encode_omemo_element(&self, element: &OmemoElement) -> Vec<u8> {
        encrypted::encode_omemo_element(element).to_string().into_bytes()
    }

    fn decode_omemo_element(&self, bytes: &[u8]) -> anyhow::Result<OmemoElement> {
        let element: Element = std::str::from_utf8(bytes)?.parse()?;
        encrypted::decode_omemo_element(&element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omemo_core::models::{DeviceId, PreKeyId, PublicKey, PublicOneTimePreKey, PublicSignedPreKey, SignedPreKeyId, WrappedKey};

    #[test]
    fn round_trips_device_list() {
        let codec = XmppElementCodec::new();
        let list = DeviceList {
            device_ids: vec![DeviceId::from(1001), DeviceId::from(1002)],
            labels: vec![Some("phone".to_string()), None],
        };
        let bytes = codec.encode_device_list(&list);
        let decoded = codec.decode_device_list(&bytes).unwrap();
        assert_eq!(decoded.device_ids, list.device_ids);
        assert_eq!(decoded.labels, list.labels);
    }

    #[test]
    fn round_trips_bundle() {
        let codec = XmppElementCodec::new();
        let bundle = Bundle {
            device_id: DeviceId::from(1001),
            identity_key: PublicKey::from(&b"identity-key-bytes"[..]),
            signed_pre_key: PublicSignedPreKey {
                id: SignedPreKeyId::from(7),
                public: PublicKey::from(&b"spk-public"[..]),
                signature: Box::from(&b"spk-signature"[..]),
            },
            pre_keys: vec![
                PublicOneTimePreKey {
                    id: PreKeyId::from(1),
                    public: PublicKey::from(&b"otpk-1"[..]),
                },
                PublicOneTimePreKey {
                    id: PreKeyId::from(2),
                    public: PublicKey::from(&b"otpk-2"[..]),
                },
            ],
        };
        let bytes = codec.encode_bundle(&bundle);
        let decoded = codec.decode_bundle_for_device(&bytes, 1001u32).unwrap();
        assert_eq!(decoded.device_id, bundle.device_id);
        assert_eq!(decoded.identity_key, bundle.identity_key);
        assert_eq!(decoded.signed_pre_key.id, bundle.signed_pre_key.id);
        assert_eq!(decoded.signed_pre_key.public, bundle.signed_pre_key.public);
        assert_eq!(decoded.pre_keys.len(), 2);
        assert_eq!(decoded.pre_keys[0].public, bundle.pre_keys[0].public);
    }

    #[test]
    fn round_trips_omemo_element_with_payload() {
        let codec = XmppElementCodec::new();
        let element = OmemoElement {
            sender_device_id: DeviceId::from(1001),
            iv: Box::from(&[1u8; 12][..]),
            keys: vec![
                WrappedKey {
                    recipient_device_id: DeviceId::from(2001),
                    is_pre_key: true,
                    encrypted_key: Box::from(&[2u8; 48][..]),
                },
                WrappedKey {
                    recipient_device_id: DeviceId::from(2002),
                    is_pre_key: false,
                    encrypted_key: Box::from(&[3u8; 48][..]),
                },
            ],
            payload: Some(Box::from(&b"ciphertext"[..])),
        };
        let bytes = codec.encode_omemo_element(&element);
        let decoded = codec.decode_omemo_element(&bytes).unwrap();
        assert_eq!(decoded.sender_device_id, element.sender_device_id);
        assert_eq!(decoded.iv, element.iv);
        assert_eq!(decoded.keys.len(), 2);
        assert!(decoded.keys[0].is_pre_key);
        assert!(!decoded.keys[1].is_pre_key);
        assert_eq!(decoded.payload, element.payload);
    }

    #[test]
    fn round_trips_key_transport_element() {
        let codec = XmppElementCodec::new();
        let element = OmemoElement {
            sender_device_id: DeviceId::from(1001),
            iv: Box::from(&[9u8; 12][..]),
            keys: vec![WrappedKey {
                recipient_device_id: DeviceId::from(2001),
                is_pre_key: false,
                encrypted_key: Box::from(&[4u8; 48][..]),
            }],
            payload: None,
        };
        let bytes = codec.encode_omemo_element(&element);
        let decoded = codec.decode_omemo_element(&bytes).unwrap();
        assert!(decoded.is_key_transport());
    }
}
