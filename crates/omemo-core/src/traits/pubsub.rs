// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::UserId;

/// Access model for a published PEP node, per §4.D ("access model `open`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessModel {
    Open,
    Presence,
    Whitelist,
}

/// §1: "a `PubSub` capability exposing node publish/fetch/delete with
/// access-model control." Operates on already-encoded item payloads;
/// encoding/decoding those payloads into domain types is
/// [`crate::traits::ElementCodec`]'s job, kept separate so this trait has no
/// XML dependency at all.
#[cfg_attr(feature = "test", mockall::automock)]
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(
        &self,
        node: &str,
        item_id: &str,
        payload: Vec<u8>,
        access: AccessModel,
    ) -> Result<(), TransportError>;

    /// Fetches the most recent item of `node` for `owner`. `None` if the
    /// node or item does not exist.
    async fn fetch(&self, owner: &UserId, node: &str) -> Result<Option<Vec<u8>>, TransportError>;

    /// Deletes `node` entirely. Idempotent: deleting an already-absent node
    /// is not an error.
    async fn delete(&self, node: &str) -> Result<(), TransportError>;
}
