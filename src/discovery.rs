//! Discovery of the custom resource types this reclaimer is responsible for.
//!
//! The reclaimer never hardcodes a CRD inventory: it lists whatever type
//! definitions are registered at call time and filters them through the
//! configured group predicate. A listing failure is fatal and propagates
//! immediately, because an inconsistent view of types would invalidate every
//! downstream diff.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::ListParams;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Api, Client, ResourceExt};

use crate::config::ReclaimerConfig;
use crate::error::{Error, Result};

/// A tracked custom resource type, as discovered from its CRD.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackedType {
    /// CRD object name, e.g. `widgets.example.io`.
    pub name: String,
    pub group: String,
    pub kind: String,
    pub plural: String,
    /// The served storage version (or the first served version).
    pub version: String,
    /// Whether instances live inside namespaces.
    pub namespaced: bool,
}

impl TrackedType {
    /// The `ApiResource` used to list and delete instances dynamically.
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

/// List all registered CRDs and keep the ones matching the group predicate.
pub async fn list_tracked_types(
    client: &Client,
    config: &ReclaimerConfig,
) -> Result<Vec<TrackedType>> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let list = crds.list(&ListParams::default()).await.map_err(|e| Error::List {
        what: "custom resource definitions".to_string(),
        source: e,
    })?;
    Ok(filter_tracked(&list.items, config))
}

/// Pure filter over an already-listed CRD inventory.
pub(crate) fn filter_tracked(
    crds: &[CustomResourceDefinition],
    config: &ReclaimerConfig,
) -> Vec<TrackedType> {
    crds.iter()
        .filter(|crd| config.is_tracked_group(&crd.spec.group))
        .filter_map(tracked_type)
        .collect()
}

/// Derive a [`TrackedType`] from a CRD, picking the served storage version.
/// A CRD with no served version is unusable and is skipped.
fn tracked_type(crd: &CustomResourceDefinition) -> Option<TrackedType> {
    let version = crd
        .spec
        .versions
        .iter()
        .find(|v| v.served && v.storage)
        .or_else(|| crd.spec.versions.iter().find(|v| v.served))?;
    Some(TrackedType {
        name: crd.name_any(),
        group: crd.spec.group.clone(),
        kind: crd.spec.names.kind.clone(),
        plural: crd.spec.names.plural.clone(),
        version: version.name.clone(),
        namespaced: crd.spec.scope == "Namespaced",
    })
}
