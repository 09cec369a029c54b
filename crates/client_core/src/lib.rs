//! Client-side core of the segmentation demo: talks to the inference backend
//! and sequences catalog bootstrap, input selection, prediction and
//! description into one observable [`DemoState`].

pub mod bootstrap;
pub mod config;
mod description;
pub mod diagnostics;
pub mod error;
mod prediction;
pub mod selection;
pub mod store;
pub mod transport;

pub use bootstrap::{load_catalog, Catalog};
pub use config::{load_settings, OverlapPolicy, Settings};
pub use error::{ConfigError, DemoError, DemoErrorKind, TransportError};
pub use selection::{Selection, UploadedFile};
pub use store::{DemoEvent, DemoState, DemoStore, RunKind, RunOutcome};
pub use transport::{HttpTransport, SegmentationApi};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
