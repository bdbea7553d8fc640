// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use bundle::{Bundle, ConsumedBundle};
pub use device_list::{CachedDeviceList, DeviceList};
pub use element::{DecryptedMessage, MessageInfo, OmemoElement, WrappedKey};
pub use ids::{Device, DeviceId, UserId};
pub use keys::{
    IdentityKeyPair, OneTimePreKey, PreKeyId, PrivateKey, PublicKey, PublicOneTimePreKey,
    PublicSignedPreKey, SignedPreKey, SignedPreKeyId,
};
pub use session::{Session, SessionData, SessionState};
pub use trust::TrustState;

mod bundle;
mod device_list;
mod element;
mod ids;
mod keys;
mod session;
mod trust;
