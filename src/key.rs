use std::fmt;

use kube::api::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::{Resource, ResourceExt};

use crate::discovery::TrackedType;

/// Identity of one live cluster object.
///
/// Group, version, and plural are carried alongside the `kind`/`name`/
/// `namespace` identity because a bare kind cannot be addressed through the
/// Kubernetes API; all fields come from the same listing source, so deriving
/// `Eq`/`Hash` over the full tuple keeps set membership exact. A key is never
/// mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub name: String,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
}

impl ObjectKey {
    /// Key for a cluster-scoped object of a statically-typed kind.
    pub fn typed<K: Resource<DynamicType = ()>>(name: &str) -> Self {
        Self {
            group: K::group(&()).to_string(),
            version: K::version(&()).to_string(),
            kind: K::kind(&()).to_string(),
            plural: K::plural(&()).to_string(),
            name: name.to_string(),
            namespace: None,
        }
    }

    /// Key for an instance of a dynamically-discovered tracked type.
    pub fn dynamic(tracked: &TrackedType, obj: &DynamicObject) -> Self {
        Self {
            group: tracked.group.clone(),
            version: tracked.version.clone(),
            kind: tracked.kind.clone(),
            plural: tracked.plural.clone(),
            name: obj.name_any(),
            namespace: obj.metadata.namespace.clone(),
        }
    }

    /// The `ApiResource` addressing this key's kind, suitable for a
    /// `DynamicObject` API.
    pub fn api_resource(&self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(&self.group, &self.version, &self.kind);
        ApiResource::from_gvk_with_plural(&gvk, &self.plural)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}
