// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::ids::DeviceId;

/// One recipient entry inside an [`OmemoElement`]: the wrapped
/// `payload_key ‖ auth_tag` for a single device, per §4.F's auth-tag framing
/// note — the 16-byte AEAD tag travels inside this blob, never alongside the
/// payload ciphertext.
#[derive(Debug, Clone)]
pub struct WrappedKey {
    pub recipient_device_id: DeviceId,
    pub is_pre_key: bool,
    pub encrypted_key: Box<[u8]>,
}

/// The on-wire encrypted envelope, per §3/§6.
#[derive(Debug, Clone)]
pub struct OmemoElement {
    pub sender_device_id: DeviceId,
    /// 12 bytes.
    pub iv: Box<[u8]>,
    pub keys: Vec<WrappedKey>,
    /// Absent for a pure key-transport element.
    pub payload: Option<Box<[u8]>>,
}

impl OmemoElement {
    pub fn is_key_transport(&self) -> bool {
        self.payload.is_none()
    }
}

/// Metadata about how a decrypted message arrived, per §4.G / §4.I.
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub identity_fingerprint: String,
    pub was_carbon: bool,
    pub was_archive: bool,
}

/// The result of a successful decrypt, per §4.G.
#[derive(Debug, Clone)]
pub struct DecryptedMessage {
    pub sender_device: crate::models::ids::Device,
    pub plaintext: Option<String>,
    pub info: MessageInfo,
}

impl DecryptedMessage {
    pub fn is_key_transport(&self) -> bool {
        self.plaintext.is_none()
    }
}
