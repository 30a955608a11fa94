//! Kubernetes client facade for caas
//!
//! Mutations (namespaces, deployments, services, ingresses) log and return
//! their errors. Reads (pods, logs, metrics) log failures and fall back to an
//! empty or zero value so telemetry gaps never break the caller.

use std::fmt::Debug;

use caas_types::{AppSpec, ContainerInfo, NamespaceInfo, PodInfo, PodStatus, PodUsage, app_selector};
use futures::future::join_all;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use kube::{Api, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ClientOptions, ClusterSource, load_config};
use crate::error::{Error, Result};
use crate::manifests::{self, IngressOptions};
use crate::metrics::PodMetrics;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
    ingress: IngressOptions,
}

impl KubeClient {
    /// Connect using in-cluster config or a local kubeconfig
    pub async fn connect(source: &ClusterSource, options: &ClientOptions) -> Result<Self> {
        let config = load_config(source, options).await?;
        info!(cluster = %config.cluster_url, namespace = %config.default_namespace, "connecting to cluster");
        let client = kube::Client::try_from(config).map_err(Error::Client)?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: kube::Client) -> Self {
        Self {
            client,
            ingress: IngressOptions::default(),
        }
    }

    pub fn with_ingress_options(mut self, ingress: IngressOptions) -> Self {
        self.ingress = ingress;
        self
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    pub async fn create_namespace(&self, name: &str) -> Result<Namespace> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        create(&api, &manifests::namespace(name), None).await
    }

    pub async fn delete_namespace(&self, name: &str) -> Result<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        delete(&api, name, None).await
    }

    pub async fn create_deployment(&self, namespace: &str, app: &AppSpec) -> Result<Deployment> {
        let deployment = manifests::deployment(app).inspect_err(|err| {
            error!(namespace, name = %app.name, error = %err, "invalid deployment request");
        })?;
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        create(&api, &deployment, Some(namespace)).await
    }

    pub async fn delete_deployment(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        delete(&api, name, Some(namespace)).await
    }

    pub async fn create_service(&self, namespace: &str, app: &AppSpec) -> Result<Service> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        create(&api, &manifests::service(app), Some(namespace)).await
    }

    pub async fn delete_service(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        delete(&api, name, Some(namespace)).await
    }

    /// Create the ingress for an app; apps without a host get none
    pub async fn create_ingress(&self, namespace: &str, app: &AppSpec) -> Result<Option<Ingress>> {
        let Some(ingress) = manifests::ingress(app, &self.ingress) else {
            debug!(namespace, name = %app.name, "no host set, skipping ingress");
            return Ok(None);
        };
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        create(&api, &ingress, Some(namespace)).await.map(Some)
    }

    pub async fn delete_ingress(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);
        delete(&api, name, Some(namespace)).await
    }

    /// Create deployment, service and (with a host) ingress for an app.
    /// Stops at the first failure without removing what was already created.
    #[instrument(skip(self, app), fields(name = %app.name))]
    pub async fn deploy_app(&self, namespace: &str, app: &AppSpec) -> Result<()> {
        self.create_deployment(namespace, app).await?;
        self.create_service(namespace, app).await?;
        self.create_ingress(namespace, app).await?;
        Ok(())
    }

    /// Remove an app's ingress, service and deployment, skipping missing ones
    #[instrument(skip(self))]
    pub async fn undeploy_app(&self, namespace: &str, name: &str) -> Result<()> {
        skip_not_found(self.delete_ingress(namespace, name).await)?;
        skip_not_found(self.delete_service(namespace, name).await)?;
        skip_not_found(self.delete_deployment(namespace, name).await)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Tenant namespaces created through this client
    pub async fn list_namespaces(&self) -> Vec<NamespaceInfo> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&manifests::managed_selector());

        match namespaces.list(&params).await {
            Ok(list) => list
                .items
                .into_iter()
                .map(|ns| {
                    let name = ns.metadata.name.unwrap_or_default();
                    let status = ns
                        .status
                        .and_then(|s| s.phase)
                        .unwrap_or_else(|| "Unknown".to_string());
                    NamespaceInfo::new(name, status)
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "failed to list namespaces");
                Vec::new()
            }
        }
    }

    /// Pods in a namespace, optionally filtered by a label selector
    pub async fn list_pods(&self, namespace: &str, label_selector: Option<&str>) -> Vec<PodInfo> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }

        match pods.list(&params).await {
            Ok(list) => list
                .items
                .into_iter()
                .map(|pod| pod_to_info(pod, namespace))
                .collect(),
            Err(err) => {
                warn!(namespace, selector = ?label_selector, error = %err, "failed to list pods");
                Vec::new()
            }
        }
    }

    pub async fn pod_logs(&self, namespace: &str, pod: &str, tail_lines: Option<i64>) -> String {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            tail_lines,
            ..Default::default()
        };

        match pods.logs(pod, &params).await {
            Ok(logs) => logs,
            Err(err) => {
                warn!(namespace, pod, error = %err, "failed to fetch pod logs");
                String::new()
            }
        }
    }

    /// Current CPU (millicores) and memory (bytes) of a pod's first container
    pub async fn pod_metrics(&self, namespace: &str, pod: &str) -> PodUsage {
        let metrics: Api<PodMetrics> = Api::namespaced(self.client.clone(), namespace);

        let usage = match metrics.get(pod).await {
            Ok(m) => m.usage(),
            Err(err) => Err(Error::api(format!("get metrics for pod '{}'", pod), err)),
        };

        usage.unwrap_or_else(|err| {
            warn!(namespace, pod, error = %err, "failed to fetch pod metrics");
            PodUsage::default()
        })
    }

    /// Summed usage of all pods labeled `app=<app>`
    pub async fn app_usage(&self, namespace: &str, app: &str) -> PodUsage {
        let pods = self.list_pods(namespace, Some(&app_selector(app))).await;
        join_all(pods.iter().map(|pod| self.pod_metrics(namespace, &pod.name)))
            .await
            .into_iter()
            .sum()
    }
}

async fn create<K>(api: &Api<K>, object: &K, namespace: Option<&str>) -> Result<K>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Serialize + Debug,
{
    let kind = K::kind(&());
    let name = object.meta().name.clone().unwrap_or_default();

    match api.create(&PostParams::default(), object).await {
        Ok(created) => {
            info!(%kind, %name, namespace = ?namespace, "created");
            Ok(created)
        }
        Err(err) => {
            error!(%kind, %name, namespace = ?namespace, error = %err, "create failed");
            Err(Error::api(describe("create", &kind, &name, namespace), err))
        }
    }
}

async fn delete<K>(api: &Api<K>, name: &str, namespace: Option<&str>) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let kind = K::kind(&());

    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(%kind, name, namespace = ?namespace, "deleted");
            Ok(())
        }
        Err(err) => {
            error!(%kind, name, namespace = ?namespace, error = %err, "delete failed");
            Err(Error::api(describe("delete", &kind, name, namespace), err))
        }
    }
}

fn describe(verb: &str, kind: &str, name: &str, namespace: Option<&str>) -> String {
    let kind = kind.to_lowercase();
    match namespace {
        Some(ns) => format!("{} {} '{}' in namespace '{}'", verb, kind, name, ns),
        None => format!("{} {} '{}'", verb, kind, name),
    }
}

fn skip_not_found(result: Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}

/// Convert a k8s Pod to PodInfo
fn pod_to_info(pod: Pod, namespace: &str) -> PodInfo {
    let name = pod.metadata.name.unwrap_or_default();
    let mut info = PodInfo::new(name, namespace.to_string());

    if let Some(spec) = &pod.spec {
        info.node_name = spec.node_name.clone();
    }

    if let Some(status) = pod.status {
        info.pod_ip = status.pod_ip;
        info.started_at = status.start_time.map(|t| t.0);
        info.status = status
            .phase
            .as_deref()
            .map(PodStatus::from)
            .unwrap_or(PodStatus::Unknown);

        if let Some(container_statuses) = status.container_statuses {
            info.containers = container_statuses
                .into_iter()
                .map(|cs| {
                    let mut container = ContainerInfo::new(cs.name);
                    container.ready = cs.ready;
                    container.restart_count = cs.restart_count;
                    container
                })
                .collect();
        }
    }

    info
}
