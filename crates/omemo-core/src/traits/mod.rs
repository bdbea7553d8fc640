// omemo-core/traits
//
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use connection::Connection;
pub use crypto_engine::CryptoEngine;
pub use element_codec::ElementCodec;
pub use key_store::KeyStore;
pub use pubsub::{AccessModel, PubSub};
pub use session_engine::SessionEngine;
pub use trust_callback::TrustCallback;

mod connection;
mod crypto_engine;
mod element_codec;
mod key_store;
mod pubsub;
mod session_engine;
mod trust_callback;

#[cfg(feature = "test")]
pub mod mocks {
    pub use super::connection::MockConnection;
    pub use super::crypto_engine::MockCryptoEngine;
    pub use super::key_store::MockKeyStore;
    pub use super::pubsub::MockPubSub;
    pub use super::session_engine::MockSessionEngine;
    pub use super::trust_callback::MockTrustCallback;
}

use std::sync::Arc;

/// Shared ownership aliases for the external collaborators, matching the
/// `Dyn*` convention used throughout the wider client for injected
/// dependencies.
pub type DynConnection = Arc<dyn Connection>;
pub type DynCryptoEngine = Arc<dyn CryptoEngine>;
pub type DynElementCodec = Arc<dyn ElementCodec>;
pub type DynKeyStore = Arc<dyn KeyStore>;
pub type DynPubSub = Arc<dyn PubSub>;
pub type DynSessionEngine = Arc<dyn SessionEngine>;
pub type DynTrustCallback = Arc<dyn TrustCallback>;
