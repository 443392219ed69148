#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/glci/issues/")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

// The binary pulls in the CLI stack; silence the facade's unused-crate check
// for those.
#[cfg(not(test))]
use {chrono as _, clap as _, serde_json as _, tokio as _, tracing_subscriber as _};

#[doc(inline)]
pub use glci_primitives as primitives;

#[doc(inline)]
pub use glci_config as config;

#[doc(inline)]
pub use glci_transforms as transforms;

#[doc(inline)]
pub use glci_storage as storage;

#[doc(inline)]
pub use glci_fetch as fetch;

#[doc(inline)]
pub use glci_features as features;

#[doc(inline)]
pub use glci_model as model;

#[doc(inline)]
pub use glci_index as index;

#[doc(inline)]
pub use glci_risk as risk;

#[doc(inline)]
pub use glci_export as export;
