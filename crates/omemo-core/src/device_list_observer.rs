// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::models::{DeviceId, UserId};
use crate::registry::DeviceRegistry;

/// §4.J: reacts to device-list pub-sub events. For our own identity, a list
/// omitting our own device id triggers a re-enrollment republish; for any
/// other identity, the announced ids are merged into the registry.
///
/// Listeners are delivered synchronously by pub-sub but the republish they
/// may trigger must not run on that same call stack (§9: re-dispatch to
/// avoid deadlocking the notification thread) — `on_device_list_event`
/// spawns the republish rather than awaiting it inline.
pub struct DeviceListObserver {
    registry: Arc<DeviceRegistry>,
    own_user_id: UserId,
    own_device_id: DeviceId,
    /// Coalesces repeated republish attempts triggered by multiple list
    /// events arriving before the first republish lands (scenario 5).
    republish_in_flight: AsyncMutex<()>,
}

impl DeviceListObserver {
    pub fn new(registry: Arc<DeviceRegistry>, own_user_id: UserId, own_device_id: DeviceId) -> Self {
        Self {
            registry,
            own_user_id,
            own_device_id,
            republish_in_flight: AsyncMutex::new(()),
        }
    }

    /// Call for every device-list pub-sub notification. `from` is `None`
    /// when the stanza's `from` attribute was absent — per §9 such events
    /// are dropped rather than logged as unexpected and acted upon.
    pub async fn on_device_list_event(
        self: &Arc<Self>,
        from: Option<&UserId>,
        remote_ids: Vec<DeviceId>,
    ) {
        let Some(from) = from else {
            warn!("Dropping device-list event with no `from` attribute.");
            return;
        };

        if from == &self.own_user_id {
            self.handle_own_list(remote_ids).await;
            return;
        }

        if let Err(err) = self.registry.merge(from, remote_ids).await {
            warn!("Failed to merge device list for {from}: {err}");
        }
    }

    async fn handle_own_list(self: &Arc<Self>, remote_ids: Vec<DeviceId>) {
        // §4.J: `new_ids = published ∪ {own}` is computed from the published
        // set, not the stale cache — merge the published list in first so
        // the cache reflects it even when it omits our own device, then
        // `ensure_self_enrolled` unions it with `own`.
        let has_own = remote_ids.contains(&self.own_device_id);
        if let Err(err) = self.registry.merge(&self.own_user_id, remote_ids).await {
            warn!("Failed to merge own device list: {err}");
            return;
        }

        if has_own {
            return;
        }

        // Avoid calling back into the pub-sub layer synchronously from
        // within the notification handler: re-dispatch onto the runtime.
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = this.republish_in_flight.lock().await;

            // Re-check under the lock: another event may have already
            // triggered (and completed) the republish we're about to do.
            match this.registry.cached(&this.own_user_id).await {
                Ok(cached) if cached.active.contains(&this.own_device_id) => return,
                Err(err) => {
                    warn!("Failed to read cached device list before re-enrolling: {err}");
                    return;
                }
                _ => {}
            }

            match this
                .registry
                .ensure_self_enrolled(&this.own_user_id, this.own_device_id)
                .await
            {
                Ok(true) => info!("Re-enrolled own device {} after omission.", this.own_device_id),
                Ok(false) => {}
                Err(err) => warn!("Failed to re-enroll own device: {err}"),
            }
        });
    }
}
