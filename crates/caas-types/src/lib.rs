//! Shared types for caas
//!
//! This crate contains data structures used across multiple caas crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;

// ============================================================================
// Kubernetes Resource Types
// ============================================================================

/// Kubernetes context information
#[derive(Clone, Debug, Serialize)]
pub struct ContextInfo {
    pub name: String,
    pub cluster: String,
    pub user: String,
    pub namespace: Option<String>,
    pub is_current: bool,
}

impl ContextInfo {
    pub fn new(
        name: String,
        cluster: String,
        user: String,
        namespace: Option<String>,
        is_current: bool,
    ) -> Self {
        Self {
            name,
            cluster,
            user,
            namespace,
            is_current,
        }
    }
}

/// Namespace information
#[derive(Clone, Debug, Serialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub status: String,
}

impl NamespaceInfo {
    pub fn new(name: String, status: String) -> Self {
        Self { name, status }
    }
}

/// Pod information
#[derive(Clone, Debug, Serialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub status: PodStatus,
    pub containers: Vec<ContainerInfo>,
    pub node_name: Option<String>,
    pub pod_ip: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl PodInfo {
    pub fn new(name: String, namespace: String) -> Self {
        Self {
            name,
            namespace,
            status: PodStatus::Unknown,
            containers: Vec::new(),
            node_name: None,
            pod_ip: None,
            started_at: None,
        }
    }

    /// Format container readiness as "ready/total"
    pub fn ready_status(&self) -> String {
        let ready = self.containers.iter().filter(|c| c.ready).count();
        format!("{}/{}", ready, self.containers.len())
    }

    /// Sum of restarts across all containers
    pub fn restarts(&self) -> i32 {
        self.containers.iter().map(|c| c.restart_count).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum PodStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodStatus {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ContainerInfo {
    pub name: String,
    pub ready: bool,
    pub restart_count: i32,
}

impl ContainerInfo {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ready: false,
            restart_count: 0,
        }
    }
}

// ============================================================================
// Usage Types
// ============================================================================

/// Normalized resource usage of a pod.
///
/// `cpu` is in millicores and `memory` in bytes. Network counters are not
/// sourced from the metrics API and stay at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodUsage {
    pub cpu: f64,
    pub memory: u64,
    pub network_in: u64,
    pub network_out: u64,
}

impl PodUsage {
    pub fn new(cpu: f64, memory: u64) -> Self {
        Self {
            cpu,
            memory,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for PodUsage {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            cpu: self.cpu + other.cpu,
            memory: self.memory.saturating_add(other.memory),
            network_in: self.network_in.saturating_add(other.network_in),
            network_out: self.network_out.saturating_add(other.network_out),
        }
    }
}

impl Sum for PodUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

// ============================================================================
// Application Types
// ============================================================================

/// Container resource limits as Kubernetes quantity strings (e.g. "500m", "256Mi")
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

impl ResourceLimits {
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// An application submitted for deployment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSpec {
    /// Name shared by the deployment, service and ingress
    pub name: String,
    pub image: String,
    /// Port the container listens on
    pub port: i32,
    pub replicas: i32,
    /// Environment variables, in the order they are passed to the container
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Public host name; no ingress is created without one
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub limits: ResourceLimits,
}

impl AppSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>, port: i32) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            port,
            replicas: 1,
            env: Vec::new(),
            host: None,
            limits: ResourceLimits::default(),
        }
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Label selector for the pods of an application
pub fn app_selector(app: &str) -> String {
    format!("app={}", app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_serializes_camel_case() {
        let json = serde_json::to_value(PodUsage::new(250.0, 1024)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"cpu": 250.0, "memory": 1024, "networkIn": 0, "networkOut": 0})
        );
    }

    #[test]
    fn test_usage_sum() {
        let total: PodUsage = vec![PodUsage::new(100.0, 10), PodUsage::new(50.5, 5)]
            .into_iter()
            .sum();
        assert_eq!(total, PodUsage::new(150.5, 15));
        assert!(std::iter::empty::<PodUsage>().sum::<PodUsage>().is_zero());
    }

    #[test]
    fn test_pod_ready_status() {
        let mut pod = PodInfo::new("web-1".to_string(), "tenant".to_string());
        let mut ready = ContainerInfo::new("web".to_string());
        ready.ready = true;
        ready.restart_count = 2;
        let mut sidecar = ContainerInfo::new("proxy".to_string());
        sidecar.restart_count = 1;
        pod.containers = vec![ready, sidecar];

        assert_eq!(pod.ready_status(), "1/2");
        assert_eq!(pod.restarts(), 3);
    }

    #[test]
    fn test_app_spec_builder() {
        let app = AppSpec::new("shop", "nginx:1.27", 8080)
            .with_replicas(3)
            .with_env("MODE", "prod")
            .with_host("shop.example.com");

        assert_eq!(app.replicas, 3);
        assert_eq!(app.env, vec![("MODE".to_string(), "prod".to_string())]);
        assert_eq!(app.host.as_deref(), Some("shop.example.com"));
        assert_eq!(app_selector(&app.name), "app=shop");
    }

    #[test]
    fn test_pod_status_from_phase() {
        assert_eq!(PodStatus::from("Running"), PodStatus::Running);
        assert_eq!(PodStatus::from("Evicted"), PodStatus::Unknown);
    }
}
