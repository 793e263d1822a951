//! Explicit reclaimer configuration.
//!
//! Everything the diff algorithm treats as policy lives here and is passed by
//! reference into the reclaimer and its collaborators: which CRD groups are
//! ours to track, which marker labels exempt an object from deletion, and the
//! deletion-confirmation timing. There is no environment-derived global state.

use std::collections::BTreeMap;
use std::time::Duration;

/// Label key marking an object whose lifecycle is owned by an external
/// manager (e.g. OLM). Deleting such an object is a no-op: the manager
/// recreates it, so the reclaimer leaves it alone.
pub const DEFAULT_MANAGED_MARKER_LABEL: &str = "olm.managed";

/// Default interval between presence polls while confirming a deletion.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default per-object deadline for a deletion to be confirmed.
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`Reclaimer`](crate::Reclaimer).
#[derive(Clone, Debug)]
pub struct ReclaimerConfig {
    /// CRD group owned by the product under test (exact match).
    pub group: String,
    /// Umbrella domain: any group equal to it or ending in `.{umbrella}` is
    /// also tracked.
    pub umbrella_domain: String,
    /// Label keys whose presence marks an object as externally
    /// lifecycle-managed and therefore exempt from deletion.
    pub managed_marker_labels: Vec<String>,
    /// Interval between presence polls in the deletion waiter.
    pub poll_interval: Duration,
    /// Per-object deadline for deletion confirmation.
    pub delete_timeout: Duration,
}

impl ReclaimerConfig {
    /// Build a config for the given product group and umbrella domain, with
    /// default marker labels and timing.
    pub fn new(group: impl Into<String>, umbrella_domain: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            umbrella_domain: umbrella_domain.into(),
            managed_marker_labels: vec![DEFAULT_MANAGED_MARKER_LABEL.to_string()],
            poll_interval: DEFAULT_POLL_INTERVAL,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }

    /// Whether a CRD group belongs to this reclaimer's responsibility.
    pub fn is_tracked_group(&self, group: &str) -> bool {
        group == self.group
            || group == self.umbrella_domain
            || group
                .strip_suffix(&self.umbrella_domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Whether an object's labels mark it as externally lifecycle-managed.
    pub fn is_externally_managed(&self, labels: &BTreeMap<String, String>) -> bool {
        self.managed_marker_labels
            .iter()
            .any(|key| labels.contains_key(key))
    }
}
