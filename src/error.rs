use thiserror::Error;

use crate::key::ObjectKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Listing a collection failed. Fatal and never retried: an inconsistent
    /// inventory would invalidate the whole diff.
    #[error("listing {what} failed: {source}")]
    List {
        what: String,
        #[source]
        source: kube::Error,
    },

    /// A delete failed for a reason other than the object already being gone.
    #[error("deleting {key} failed: {source}")]
    Delete {
        key: ObjectKey,
        #[source]
        source: kube::Error,
    },

    /// An object outlived the deletion-confirmation deadline, typically
    /// because a finalizer is stuck.
    #[error("timed out waiting for {key} to be deleted")]
    DeletionTimeout { key: ObjectKey },

    /// Usage-contract violation: with no baseline recorded, a cleanup would
    /// diff against an empty snapshot and delete everything in sight.
    #[error("cleanup invoked before record; refusing to diff against an empty baseline")]
    CleanupBeforeRecord,
}

/// Short alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
