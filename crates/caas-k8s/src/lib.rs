//! Kubernetes client for caas
//!
//! This crate provides Kubernetes API integration for tenant namespaces,
//! application deployments, and pod logs and metrics.

mod client;
pub mod config;
mod error;
pub mod manifests;
pub mod metrics;
pub mod quantity;

pub use client::KubeClient;
pub use config::{ClientOptions, ClusterSource, list_contexts};
pub use error::{Error, Result};
pub use manifests::IngressOptions;
pub use quantity::{QuantityError, parse_cpu_usage, parse_memory_usage};

// Re-export types that are used in our public API
pub use caas_types::{
    AppSpec, ContainerInfo, ContextInfo, NamespaceInfo, PodInfo, PodStatus, PodUsage,
    ResourceLimits,
};
