// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::ids::DeviceId;
use crate::models::keys::{PublicKey, PublicOneTimePreKey, PublicSignedPreKey};

/// The published pre-key material for one device, per §3/§6. Fetched by a
/// peer wanting to establish a session with us.
#[derive(Clone, Debug)]
pub struct Bundle {
    pub device_id: DeviceId,
    pub identity_key: PublicKey,
    pub signed_pre_key: PublicSignedPreKey,
    pub pre_keys: Vec<PublicOneTimePreKey>,
}

/// The narrowed view of a [`Bundle`] after [`BundleService::fetch`] has
/// selected exactly one one-time pre-key, ready to hand to the session
/// engine for X3DH. Constructing one is the point at which the selected
/// pre-key is considered consumed (invariant 4).
#[derive(Clone, Debug)]
pub struct ConsumedBundle {
    pub device_id: DeviceId,
    pub identity_key: PublicKey,
    pub signed_pre_key: PublicSignedPreKey,
    pub pre_key: PublicOneTimePreKey,
}
