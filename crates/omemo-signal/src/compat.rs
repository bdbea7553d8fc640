// omemo-signal
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// Type conversions and error mapping between omemo-core's transport/crypto
// agnostic models and libsignal-protocol's own types, grounded on
// prose-core-client's `signal_compat.rs`.

use std::str::FromStr;

use libsignal_protocol::error::SignalProtocolError as SignalError;
use libsignal_protocol::ProtocolAddress;

use omemo_core::models::{Device, DeviceId, UserId};

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct UnwindSafeError(pub String);

/// Wraps any store-side failure (an `IdentityError`/`CryptoError` from
/// `omemo-core`, or a parse error) as a `SignalProtocolError` so it can
/// cross back through libsignal's own `Result` plumbing.
pub fn map_store_error<E: std::fmt::Display>(err: E) -> SignalError {
    SignalError::ApplicationCallbackError(
        "KeyStoreError",
        Box::new(UnwindSafeError(err.to_string())),
    )
}

pub trait ProtocolAddressExt {
    fn omemo_device(&self) -> Result<Device, SignalError>;
}

impl ProtocolAddressExt for ProtocolAddress {
    fn omemo_device(&self) -> Result<Device, SignalError> {
        let owner = UserId::from_str(self.name()).map_err(|err| {
            SignalError::ApplicationCallbackError(
                "UserId Parse Error",
                Box::new(UnwindSafeError(err.to_string())),
            )
        })?;
        Ok(Device::new(owner, from_signal_device_id(self.device_id())))
    }
}

pub fn protocol_address(device: &Device) -> ProtocolAddress {
    ProtocolAddress::new(device.owner.to_string(), to_signal_device_id(device.device_id))
}

/// Neither `DeviceId` nor `libsignal_protocol::DeviceId` is local to this
/// crate, so the conversion is a pair of free functions rather than a
/// `From` impl (the orphan rule blocks a foreign-to-foreign trait impl).
pub fn to_signal_device_id(id: DeviceId) -> libsignal_protocol::DeviceId {
    libsignal_protocol::DeviceId::from(id.into_inner())
}

pub fn from_signal_device_id(id: libsignal_protocol::DeviceId) -> DeviceId {
    DeviceId::from(u32::from(id))
}
