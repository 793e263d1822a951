//! The snapshot/diff/teardown engine.
//!
//! A [`Reclaimer`] snapshots the identity of every object of interest before a
//! test scenario runs ([`Reclaimer::record`]), then removes exactly the
//! objects absent from that snapshot ([`Reclaimer::cleanup`]). Deletion runs
//! in three waves: tracked custom-resource instances first (confirmed gone
//! before anything else, so finalizing controllers can still reach their
//! supporting infrastructure), then generic cluster-scoped objects, then the
//! type definitions themselves, whose deletion cascades.
//!
//! Each instance is a self-contained state machine: no background tasks, all
//! work happens inside the async calls, and two instances (e.g. one per
//! cluster in a multi-cluster scenario) share nothing.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{DeleteParams, DynamicObject, ListParams};
use kube::core::ClusterResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::baseline::Baseline;
use crate::config::ReclaimerConfig;
use crate::discovery::{list_tracked_types, TrackedType};
use crate::error::{Error, Result};
use crate::key::ObjectKey;

/// Caller-supplied hook invoked before each individual deletion, with the
/// object's key and the reclaimer's contextual label. Reporting side channel
/// only; never part of the correctness contract.
pub type NarrationHook = Box<dyn Fn(&ObjectKey, Option<&str>) + Send + Sync>;

/// Differential resource reclaimer for one target cluster.
pub struct Reclaimer {
    client: Client,
    config: ReclaimerConfig,
    baseline: Baseline,
    recorded: bool,
    label: Option<String>,
    narrator: Option<NarrationHook>,
}

impl fmt::Debug for Reclaimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reclaimer")
            .field("recorded", &self.recorded)
            .field("label", &self.label)
            .field("baseline", &self.baseline)
            .finish_non_exhaustive()
    }
}

impl Reclaimer {
    /// Create an empty reclaimer. Nothing is recorded until
    /// [`record`](Self::record) runs.
    pub fn new(client: Client, config: ReclaimerConfig) -> Self {
        Self {
            client,
            config,
            baseline: Baseline::default(),
            recorded: false,
            label: None,
            narrator: None,
        }
    }

    /// Attach a contextual label (e.g. the cluster name) used only in
    /// narration and log output.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attach a narration hook invoked before each individual deletion.
    pub fn with_narrator(
        mut self,
        hook: impl Fn(&ObjectKey, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.narrator = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Whether a baseline has been recorded.
    pub fn recorded(&self) -> bool {
        self.recorded
    }

    /// Read access to the current baseline, mainly for diagnostics.
    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    // ── Snapshot recorder ───────────────────────────────────────────────────

    /// Capture the identity of every object of interest currently in the
    /// cluster: namespaces, cluster roles, cluster role bindings, tracked
    /// type definitions, and all instances of tracked types.
    ///
    /// Read-only against the cluster. Calling it again replaces the previous
    /// baseline wholesale.
    pub async fn record(&mut self) -> Result<()> {
        let mut baseline = Baseline::default();

        for (key, _) in list_cluster_scoped(&self.client).await? {
            baseline.cluster_scoped.insert(key);
        }

        for tracked in list_tracked_types(&self.client, &self.config).await? {
            let instances = list_instances(&self.client, &tracked).await?;
            debug!(
                crd = %tracked.name,
                instances = instances.len(),
                "recorded tracked type"
            );
            baseline.tracked_types.insert(tracked.name.clone());
            baseline
                .instances
                .insert(tracked.name, instances.into_iter().collect());
        }

        info!(
            label = self.label.as_deref().unwrap_or_default(),
            cluster_scoped = baseline.cluster_scoped.len(),
            tracked_types = baseline.tracked_types.len(),
            "recorded baseline"
        );
        self.baseline = baseline;
        self.recorded = true;
        Ok(())
    }

    // ── Differential collector ──────────────────────────────────────────────

    /// [`cleanup_no_wait`](Self::cleanup_no_wait) followed by a wait for every
    /// returned key to be confirmed absent.
    pub async fn cleanup(&self) -> Result<()> {
        let deleted = self.cleanup_no_wait().await?;
        self.wait_for_deletion(&deleted).await
    }

    /// Delete everything that is absent from the baseline and return the keys
    /// deleted but not yet confirmed gone.
    ///
    /// Wave 1 (tracked custom-resource instances) is deleted *and confirmed*
    /// internally before the later waves run; its keys are not re-returned.
    /// The returned keys are the union of wave 2 (generic cluster-scoped
    /// objects) and wave 3 (type definitions), letting a caller drain several
    /// reclaimers concurrently and await them separately.
    ///
    /// Fails with [`Error::CleanupBeforeRecord`] if no baseline was recorded;
    /// an empty baseline would otherwise mean "delete everything".
    pub async fn cleanup_no_wait(&self) -> Result<Vec<ObjectKey>> {
        if !self.recorded {
            return Err(Error::CleanupBeforeRecord);
        }

        // Wave 1: unrecorded instances of every currently-tracked type. This
        // includes all instances of types that were not tracked (or did not
        // exist) at record time.
        let mut instance_keys = Vec::new();
        for tracked in list_tracked_types(&self.client, &self.config).await? {
            for key in list_instances(&self.client, &tracked).await? {
                if self.baseline.contains_instance(&tracked.name, &key) {
                    continue;
                }
                self.delete(&key).await?;
                instance_keys.push(key);
            }
        }

        // Confirm wave 1 before touching namespaces or type definitions, so
        // controllers holding finalizers on these instances can still react
        // while their supporting infrastructure exists.
        debug!(deleted = instance_keys.len(), "confirming custom-resource wave");
        self.wait_for_deletion(&instance_keys).await?;

        let mut deleted = Vec::new();

        // Wave 2: unrecorded namespaces, cluster roles, and cluster role
        // bindings, except those marked externally lifecycle-managed.
        for (key, labels) in list_cluster_scoped(&self.client).await? {
            if self.baseline.cluster_scoped.contains(&key) {
                continue;
            }
            if self.config.is_externally_managed(&labels) {
                debug!(object = %key, "skipping externally managed object");
                continue;
            }
            self.delete(&key).await?;
            deleted.push(key);
        }

        // Wave 3: unrecorded type definitions, last because CRD deletion
        // cascades deletion of any remaining instances.
        for tracked in list_tracked_types(&self.client, &self.config).await? {
            if self.baseline.tracked_types.contains(&tracked.name) {
                continue;
            }
            let key = ObjectKey::typed::<CustomResourceDefinition>(&tracked.name);
            self.delete(&key).await?;
            deleted.push(key);
        }

        Ok(deleted)
    }

    /// Wait for every key to be confirmed absent. See [`wait_for_deletion`].
    pub async fn wait_for_deletion(&self, keys: &[ObjectKey]) -> Result<()> {
        wait_for_deletion(&self.client, &self.config, keys).await
    }

    /// Narrate and issue one deletion. Deleting an object that is already
    /// absent is success, never an error: some other deleter may have raced
    /// us, and the outcome is the one we wanted.
    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        info!(
            kind = %key.kind,
            name = %key.name,
            namespace = key.namespace.as_deref().unwrap_or_default(),
            label = self.label.as_deref().unwrap_or_default(),
            "deleting object"
        );
        if let Some(hook) = &self.narrator {
            hook(key, self.label.as_deref());
        }
        delete_object(&self.client, key).await
    }
}

// ── Deletion waiter ─────────────────────────────────────────────────────────

/// Poll for the absence of each key in turn, at `config.poll_interval`, until
/// it is confirmed gone or `config.delete_timeout` elapses for that object.
///
/// A free function (rather than only a method) so that independent reclaimers
/// can be drained concurrently: call `cleanup_no_wait` on each, then await
/// each returned key set.
pub async fn wait_for_deletion(
    client: &Client,
    config: &ReclaimerConfig,
    keys: &[ObjectKey],
) -> Result<()> {
    for key in keys {
        let api = dynamic_api(client, key);
        let deadline = Instant::now() + config.delete_timeout;
        loop {
            if api.get_opt(&key.name).await?.is_none() {
                debug!(object = %key, "deletion confirmed");
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::DeletionTimeout { key: key.clone() });
            }
            tokio::time::sleep(config.poll_interval).await;
        }
    }
    Ok(())
}

// ── Object store access ─────────────────────────────────────────────────────

/// Dynamic API handle addressing the kind behind `key`.
fn dynamic_api(client: &Client, key: &ObjectKey) -> Api<DynamicObject> {
    let ar = key.api_resource();
    match &key.namespace {
        Some(ns) => Api::namespaced_with(client.clone(), ns, &ar),
        None => Api::all_with(client.clone(), &ar),
    }
}

/// Issue a delete for `key`, treating "already absent" (404) as success.
async fn delete_object(client: &Client, key: &ObjectKey) -> Result<()> {
    let api = dynamic_api(client, key);
    match api.delete(&key.name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Error::Delete {
            key: key.clone(),
            source: e,
        }),
    }
}

/// List all current instances of a tracked type, across all namespaces.
async fn list_instances(client: &Client, tracked: &TrackedType) -> Result<Vec<ObjectKey>> {
    let api: Api<DynamicObject> = Api::all_with(client.clone(), &tracked.api_resource());
    let list = api.list(&ListParams::default()).await.map_err(|e| Error::List {
        what: format!("{} instances", tracked.name),
        source: e,
    })?;
    Ok(list
        .items
        .iter()
        .map(|obj| ObjectKey::dynamic(tracked, obj))
        .collect())
}

/// List the cluster-scoped kinds of interest, with their labels (the labels
/// feed the externally-managed check during cleanup).
async fn list_cluster_scoped(
    client: &Client,
) -> Result<Vec<(ObjectKey, BTreeMap<String, String>)>> {
    let mut out = list_cluster_keys::<Namespace>(client, "namespaces").await?;
    out.extend(list_cluster_keys::<ClusterRole>(client, "cluster roles").await?);
    out.extend(list_cluster_keys::<ClusterRoleBinding>(client, "cluster role bindings").await?);
    Ok(out)
}

async fn list_cluster_keys<K>(
    client: &Client,
    what: &str,
) -> Result<Vec<(ObjectKey, BTreeMap<String, String>)>>
where
    K: Resource<DynamicType = (), Scope = ClusterResourceScope>
        + Clone
        + fmt::Debug
        + serde::de::DeserializeOwned,
{
    let api: Api<K> = Api::all(client.clone());
    let list = api.list(&ListParams::default()).await.map_err(|e| Error::List {
        what: what.to_string(),
        source: e,
    })?;
    Ok(list
        .items
        .iter()
        .map(|obj| (ObjectKey::typed::<K>(&obj.name_any()), obj.labels().clone()))
        .collect())
}
