// omemo-core
//
// License: Mozilla Public License v2.0 (MPL v2.0)
//
// Transport- and crypto-agnostic OMEMO session and key-agreement engine:
// device discovery, pre-key bundles, Double-Ratchet session lifecycle,
// trust gating and the encrypt/decrypt pipelines. Concrete crypto, storage
// and wire implementations live in sibling crates; this crate only defines
// the domain model and the traits those implementations satisfy.

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

mod bundle_service;
mod core;
mod decryptor;
mod device_list_observer;
mod encryptor;
mod receive_pipeline;
mod registry;
mod trust_gate;

#[cfg(feature = "test")]
pub mod test_support;

pub use bundle_service::BundleService;
pub use core::OmemoCore;
pub use decryptor::Decryptor;
pub use device_list_observer::DeviceListObserver;
pub use encryptor::Encryptor;
pub use receive_pipeline::{ReceiveOrigin, ReceivePipeline};
pub use registry::DeviceRegistry;
pub use trust_gate::TrustGate;
