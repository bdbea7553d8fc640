// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

use async_trait::async_trait;

use crate::error::TransportError;
use crate::models::{OmemoElement, UserId};

/// §1: "The core consumes a `Connection` capability exposing stanza
/// send/receive." Stanza parsing/serialization itself is delegated further
/// to [`crate::traits::ElementCodec`]; this trait only moves an already-built
/// [`OmemoElement`] onto (or off of) the wire, addressed to a bare JID.
#[cfg_attr(feature = "test", mockall::automock)]
#[async_trait]
pub trait Connection: Send + Sync {
    fn is_connected(&self) -> bool;

    fn own_user_id(&self) -> Option<UserId>;

    /// Sends a `<message/>` carrying `element` to `to`. §5: must not be
    /// called while the core's coarse mutex is held.
    async fn send_encrypted_message(
        &self,
        to: &UserId,
        element: OmemoElement,
    ) -> Result<(), TransportError>;
}
