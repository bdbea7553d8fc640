// omemo-signal
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// libsignal-protocol-backed `CryptoEngine` and `SessionEngine` for
// omemo-core: X3DH session establishment and Double-Ratchet message keys
// via `libsignal-protocol`, layered under the payload AEAD omemo-core's
// `Encryptor`/`Decryptor` drive directly.

mod compat;
mod crypto_engine;
mod repo_adapter;
mod session_engine;

pub use crypto_engine::SignalCryptoEngine;
pub use session_engine::SignalSessionEngine;
