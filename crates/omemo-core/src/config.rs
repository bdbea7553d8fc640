// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::time::Duration;

/// §6 "Recognized configuration options", realized as a plain struct
/// constructed via [`Default`] and builder-style setters — no external
/// config-file format, matching the teacher's `AppConfig`.
#[derive(Debug, Clone)]
pub struct OmemoConfig {
    /// Include a sentinel plaintext body describing OMEMO, for clients that
    /// don't support it.
    pub add_omemo_hint_body: bool,
    /// Include a hint requesting archival of bodiless (key-transport)
    /// messages.
    pub add_mam_storage_hint: bool,
    /// Include an explicit-message-encryption hint element.
    pub add_eme_hint: bool,
    /// Target size of the one-time pre-key pool.
    pub prekey_pool_target: u32,
    /// Refill threshold: republish once the pool drops below this.
    pub prekey_pool_low_water: u32,
    /// Days before a signed pre-key is rotated.
    pub signed_prekey_max_age: Duration,
    /// Days a rotated-out signed pre-key is still accepted, for late
    /// deliveries.
    pub signed_prekey_grace: Duration,
    /// How long a cached device list may go unrefreshed before
    /// `DeviceRegistry::active_devices` triggers a background refresh.
    pub stale_threshold: Duration,
    /// Bound on the skipped-message-key map per ratchet chain (§3).
    pub max_skip: u32,
}

impl Default for OmemoConfig {
    fn default() -> Self {
        Self {
            add_omemo_hint_body: true,
            add_mam_storage_hint: true,
            add_eme_hint: true,
            prekey_pool_target: 100,
            prekey_pool_low_water: 20,
            signed_prekey_max_age: Duration::from_secs(7 * 24 * 3600),
            signed_prekey_grace: Duration::from_secs(30 * 24 * 3600),
            stale_threshold: Duration::from_secs(15 * 60),
            max_skip: 1000,
        }
    }
}

impl OmemoConfig {
    pub fn with_prekey_pool_target(mut self, target: u32) -> Self {
        self.prekey_pool_target = target;
        self
    }

    pub fn with_prekey_pool_low_water(mut self, low_water: u32) -> Self {
        self.prekey_pool_low_water = low_water;
        self
    }

    pub fn with_signed_prekey_max_age(mut self, age: Duration) -> Self {
        self.signed_prekey_max_age = age;
        self
    }

    pub fn with_signed_prekey_grace(mut self, grace: Duration) -> Self {
        self.signed_prekey_grace = grace;
        self
    }

    pub fn with_stale_threshold(mut self, threshold: Duration) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_max_skip(mut self, max_skip: u32) -> Self {
        self.max_skip = max_skip;
        self
    }
}
