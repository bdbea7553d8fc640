// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use jid::BareJid;
use serde::{Deserialize, Serialize};

/// A federated identity, independent of any one device.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(BareJid);

impl From<BareJid> for UserId {
    fn from(value: BareJid) -> Self {
        UserId(value)
    }
}

impl UserId {
    pub fn into_inner(self) -> BareJid {
        self.0
    }

    pub fn as_bare_jid(&self) -> &BareJid {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = jid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(UserId(s.parse::<BareJid>()?))
    }
}

impl Debug for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A device identifier, unique within the scope of a single [`UserId`].
///
/// Per §3 the valid range is `[1, 2^31-1]`; `0` and the high bit are never
/// assigned by [`DeviceId::generate`] but are accepted from the wire since
/// other implementations are not bound by our own generator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u32);

impl From<u32> for DeviceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<DeviceId> for u32 {
    fn from(value: DeviceId) -> Self {
        value.0
    }
}

impl AsRef<u32> for DeviceId {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = <u32 as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl DeviceId {
    pub fn into_inner(self) -> u32 {
        self.0
    }

    /// Draws a random device id from the valid range, matching
    /// `RandUserDeviceIdProvider` in spirit: device ids are not sequential,
    /// to avoid leaking enrollment order.
    pub fn generate(rng: &mut impl rand::Rng) -> Self {
        Self(rng.gen_range(1..2u32.pow(31)))
    }
}

/// A single device, scoped to the identity that owns it. Equality is
/// structural per §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    pub owner: UserId,
    pub device_id: DeviceId,
}

impl Device {
    pub fn new(owner: UserId, device_id: DeviceId) -> Self {
        Self { owner, device_id }
    }
}

impl Display for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.owner, self.device_id)
    }
}
