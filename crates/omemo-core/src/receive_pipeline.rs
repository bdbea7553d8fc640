// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use tracing::warn;

use crate::decryptor::Decryptor;
use crate::error::DecryptError;
use crate::models::{DecryptedMessage, DeviceId, OmemoElement, UserId};

/// §4.I: where an inbound element came from. Archive replay never triggers
/// re-encryption side effects (e.g. eager pre-key replenishment).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOrigin {
    Direct,
    CarbonSent,
    CarbonReceived,
    Archive,
}

impl ReceiveOrigin {
    fn was_carbon(&self) -> bool {
        matches!(self, ReceiveOrigin::CarbonSent | ReceiveOrigin::CarbonReceived)
    }

    fn was_archive(&self) -> bool {
        matches!(self, ReceiveOrigin::Archive)
    }
}

/// §4.I: the single handler shared by direct messages, both carbon
/// directions, and archive replay.
pub struct ReceivePipeline {
    decryptor: Arc<Decryptor>,
}

impl ReceivePipeline {
    pub fn new(decryptor: Arc<Decryptor>) -> Self {
        Self { decryptor }
    }

    /// Processes one inbound element. `sender_owner` is the bare JID the
    /// element logically came from — for a `CarbonSent` element that is our
    /// own identity, since sent-carbons from our other devices surface our
    /// own outbound plaintext for UI consistency.
    pub async fn handle(
        &self,
        sender_owner: &UserId,
        own_device_id: DeviceId,
        element: OmemoElement,
        origin: ReceiveOrigin,
    ) -> Result<Option<DecryptedMessage>, DecryptError> {
        match self
            .decryptor
            .decrypt(
                sender_owner,
                own_device_id,
                element,
                origin.was_carbon(),
                origin.was_archive(),
            )
            .await
        {
            Ok(message) => Ok(Some(message)),
            Err(DecryptError::NotForUs) => Ok(None),
            Err(err) => {
                warn!("Failed to decrypt inbound element from {sender_owner}: {err}");
                Err(err)
            }
        }
    }
}
