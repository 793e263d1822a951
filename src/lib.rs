//! Differential resource reclaimer for integration tests on shared clusters.
//!
//! A [`Reclaimer`] snapshots the set of objects that exist before a test
//! scenario runs, lets the scenario create and mutate arbitrary objects
//! (including instances of dynamically-discovered custom resource types), and
//! then removes exactly the objects that did not exist in the snapshot, in an
//! order that respects CRD dependencies and asynchronous finalization.
//!
//! ```ignore
//! let mut reclaimer = Reclaimer::new(client, ReclaimerConfig::new("example.io", "umbrella.io"))
//!     .with_label("cluster-a");
//! reclaimer.record().await?;
//! // ... scenario runs ...
//! reclaimer.cleanup().await?;
//! ```

pub mod baseline;
pub mod config;
pub mod discovery;
pub mod error;
pub mod key;
pub mod reclaimer;

pub use baseline::Baseline;
pub use config::ReclaimerConfig;
pub use discovery::{list_tracked_types, TrackedType};
pub use error::{Error, Result};
pub use key::ObjectKey;
pub use reclaimer::{wait_for_deletion, NarrationHook, Reclaimer};
