// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::{Bundle, DeviceList, OmemoElement};

/// §1: "Stanza parsing and XML serialization of wire elements (delegated to
/// an `ElementCodec`)." The core never touches `minidom`/`xmpp-parsers`
/// directly; it only moves bytes through this boundary.
pub trait ElementCodec: Send + Sync {
    fn encode_device_list(&self, list: &DeviceList) -> Vec<u8>;
    fn decode_device_list(&self, bytes: &[u8]) -> anyhow::Result<DeviceList>;

    fn encode_bundle(&self, bundle: &Bundle) -> Vec<u8>;
    fn decode_bundle(&self, bytes: &[u8]) -> anyhow::Result<Bundle>;

    fn encode_omemo_element(&self, element: &OmemoElement) -> Vec<u8>;
    fn decode_omemo_element(&self, bytes: &[u8]) -> anyhow::Result<OmemoElement>;
}
