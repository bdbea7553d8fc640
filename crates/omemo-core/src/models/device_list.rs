// omemo-core/models
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::HashSet;

use crate::models::ids::DeviceId;

/// A published device list, per §3/§6.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub device_ids: Vec<DeviceId>,
    /// Human-readable label per device, keyed by position in `device_ids`.
    /// Additive: see SPEC_FULL.md §3.x.
    pub labels: Vec<Option<String>>,
}

/// The locally cached view of one identity's devices: the last-known active
/// set plus fingerprint history for ids that were seen once and later
/// dropped (§3: "never deleted once seen").
#[derive(Debug, Clone, Default)]
pub struct CachedDeviceList {
    pub active: HashSet<DeviceId>,
    pub inactive: HashSet<DeviceId>,
    pub last_refreshed_at: Option<u64>,
}

impl CachedDeviceList {
    /// Applies a freshly fetched/announced set of ids, per `DeviceRegistry::merge`:
    /// the new set becomes active; anything previously active but now absent
    /// becomes inactive, retained forever.
    pub fn merge(&mut self, remote_ids: impl IntoIterator<Item = DeviceId>) {
        let new_active: HashSet<DeviceId> = remote_ids.into_iter().collect();

        for id in self.active.difference(&new_active).copied().collect::<Vec<_>>() {
            self.inactive.insert(id);
        }

        self.inactive.retain(|id| !new_active.contains(id));
        self.active = new_active;
    }

    pub fn contains(&self, id: &DeviceId) -> bool {
        self.active.contains(id) || self.inactive.contains(id)
    }
}
