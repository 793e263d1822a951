//! The recorded snapshot against which later cluster state is diffed.

use std::collections::{HashMap, HashSet};

use crate::key::ObjectKey;

/// Identity sets captured at record time.
///
/// A baseline is only ever written by [`Reclaimer::record`](crate::Reclaimer::record)
/// and only ever read during cleanup; cleanup never mutates it, so repeated
/// cleanups diff against the same snapshot.
#[derive(Clone, Debug, Default)]
pub struct Baseline {
    /// Cluster-scoped objects of interest (namespaces, cluster roles,
    /// cluster role bindings) present at record time.
    pub cluster_scoped: HashSet<ObjectKey>,
    /// Tracked type definitions (by CRD name) present at record time.
    pub tracked_types: HashSet<String>,
    /// Per tracked type, the instances present at record time.
    pub instances: HashMap<String, HashSet<ObjectKey>>,
}

impl Baseline {
    /// Whether an instance of the given tracked type was present at record
    /// time. A type with no baseline entry (it did not exist, or was not
    /// tracked, when the snapshot was taken) has no recorded instances, so
    /// every current instance is unrecorded.
    pub fn contains_instance(&self, type_name: &str, key: &ObjectKey) -> bool {
        self.instances
            .get(type_name)
            .is_some_and(|set| set.contains(key))
    }
}
