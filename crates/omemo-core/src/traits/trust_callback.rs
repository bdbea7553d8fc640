// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::models::Device;

/// §1/§4.H: a UI-facing hook the core notifies — never blocks on, never
/// receives a verdict from — when it encounters a device it has no trust
/// decision for. The host application is expected to prompt the user
/// out-of-band and record the outcome via `KeyStore::set_trust_state`; the
/// gated send that triggered this notification still fails with
/// `UndecidedDevices` and must be retried by the caller.
///
/// Per §4.H a `TrustCallback` may only be installed once per core instance;
/// [`crate::core::OmemoCore::install_trust_callback`] enforces that.
#[cfg_attr(feature = "test", mockall::automock)]
pub trait TrustCallback: Send + Sync {
    fn on_undecided_device(&self, device: &Device, fingerprint: &str);
}
