//! Cluster Resource API boundary.
//!
//! [`ResourceStore`] is the per-kind surface the orchestrator needs and
//! [`Cluster`] bundles the three kinds an App is made of. [`KubeCluster`] is
//! the production implementation on top of a namespaced `kube` client.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::{Error, Result};

/// Namespace scoped create, get, delete and list of one resource kind
pub trait ResourceStore<K>: Send + Sync {
    /// Creates `object`, failing with [`Error::Conflict`] if it already exists
    fn create(&self, object: &K) -> impl Future<Output = Result<K>> + Send;

    /// Fetches the object named `name`, failing with [`Error::NotFound`] if absent
    fn get(&self, name: &str) -> impl Future<Output = Result<K>> + Send;

    /// Deletes the object named `name`, failing with [`Error::NotFound`] if absent
    fn delete(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// Lists objects matching a label selector such as `user=alice`
    fn list(&self, label_selector: &str) -> impl Future<Output = Result<Vec<K>>> + Send;
}

/// Every resource kind an App is composed of, in one fixed namespace
pub trait Cluster:
    ResourceStore<Deployment> + ResourceStore<Service> + ResourceStore<Ingress>
{
    /// Namespace every call operates in
    fn namespace(&self) -> &str;
}

/// [`Cluster`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
    timeout: Duration,
}

impl KubeCluster {
    /// Wraps `client`, every call is bounded by `timeout`
    #[must_use]
    pub fn new(client: Client, namespace: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            timeout,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn call<K, T, F>(&self, operation: &'static str, name: &str, request: F) -> Result<T>
    where
        K: Resource<DynamicType = ()>,
        F: Future<Output = kube::Result<T>>,
    {
        let kind = K::kind(&()).into_owned();
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|err| classify(err, kind, name)),
            Err(_) => Err(Error::Timeout { kind, operation }),
        }
    }
}

/// Maps API status codes that carry meaning for the orchestrator
fn classify(err: kube::Error, kind: String, name: &str) -> Error {
    match err {
        kube::Error::Api(ref response) if response.code == 404 => Error::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(ref response) if response.code == 409 => Error::Conflict {
            kind,
            name: name.to_string(),
        },
        other => Error::KubeError(other),
    }
}

impl<K> ResourceStore<K> for KubeCluster
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    #[instrument(skip_all, fields(kind = %K::kind(&()), name = %object.name_any(), namespace = %self.namespace))]
    async fn create(&self, object: &K) -> Result<K> {
        let name = object.name_any();
        let api = self.api::<K>();
        let created = self
            .call::<K, _, _>("create", &name, api.create(&PostParams::default(), object))
            .await?;
        debug!("created object");
        Ok(created)
    }

    async fn get(&self, name: &str) -> Result<K> {
        let api = self.api::<K>();
        self.call::<K, _, _>("get", name, api.get(name)).await
    }

    #[instrument(skip(self), fields(kind = %K::kind(&()), namespace = %self.namespace))]
    async fn delete(&self, name: &str) -> Result<()> {
        let api = self.api::<K>();
        self.call::<K, _, _>("delete", name, api.delete(name, &DeleteParams::background()))
            .await?;
        debug!("deletion accepted");
        Ok(())
    }

    async fn list(&self, label_selector: &str) -> Result<Vec<K>> {
        let api = self.api::<K>();
        let params = ListParams::default().labels(label_selector);
        let list = self
            .call::<K, _, _>("list", label_selector, api.list(&params))
            .await?;
        Ok(list.items)
    }
}

impl Cluster for KubeCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }
}
