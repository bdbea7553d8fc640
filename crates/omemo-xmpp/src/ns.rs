// omemo-xmpp
//
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use xmpp_parsers::ns::*;

/// XEP-0384: OMEMO Encryption (current, non-legacy namespace). §6 names
/// both this and [`LEGACY_OMEMO`] as acceptable on the wire; this crate
/// emits the modern namespace and accepts either on decode.
pub const OMEMO: &str = "urn:xmpp:omemo:0";
pub const OMEMO_DEVICELIST: &str = "urn:xmpp:omemo:0:devicelist";
pub const OMEMO_BUNDLES: &str = "urn:xmpp:omemo:0:bundles";

// XEP-0384 draft / Conversations-era legacy namespace, still the one most
// deployed clients speak: `LEGACY_OMEMO`, `LEGACY_OMEMO_DEVICELIST` and
// `LEGACY_OMEMO_BUNDLES`, all re-exported above via the glob import.

/// XEP-0334: Message Processing Hints — used for `add_mam_storage_hint`.
pub const HINTS: &str = "urn:xmpp:hints";

/// XEP-0380: Explicit Message Encryption — used for `add_eme_hint`.
pub const EME: &str = "urn:xmpp:eme:0";
