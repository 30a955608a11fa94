//! Metrics API (`metrics.k8s.io/v1beta1`) pod metrics resource

use caas_types::PodUsage;
use k8s_openapi::apimachinery::pkg::{api::resource::Quantity, apis::meta::v1::ObjectMeta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quantity::{parse_cpu_usage, parse_memory_usage};

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetricsContainer {
    pub name: String,
    pub usage: PodMetricsContainerUsage,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetricsContainerUsage {
    pub cpu: Quantity,
    pub memory: Quantity,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub window: Option<String>,
    #[serde(default)]
    pub containers: Vec<PodMetricsContainer>,
}

impl k8s_openapi::Resource for PodMetrics {
    type Scope = k8s_openapi::NamespaceResourceScope;

    const API_VERSION: &'static str = "metrics.k8s.io/v1beta1";
    const GROUP: &'static str = "metrics.k8s.io";
    const KIND: &'static str = "PodMetrics";
    const URL_PATH_SEGMENT: &'static str = "pods";
    const VERSION: &'static str = "v1beta1";
}

impl k8s_openapi::Metadata for PodMetrics {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

impl PodMetrics {
    /// Normalized usage of the pod's first container
    pub fn usage(&self) -> Result<PodUsage> {
        let pod = self.metadata.name.clone().unwrap_or_default();
        let container = self
            .containers
            .first()
            .ok_or(Error::MissingContainerMetrics { pod })?;

        let cpu = parse_cpu_usage(&container.usage.cpu.0)?;
        let memory = parse_memory_usage(&container.usage.memory.0)?;

        Ok(PodUsage::new(cpu, memory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::QuantityError;

    fn metrics(json: serde_json::Value) -> PodMetrics {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_usage_from_first_container() {
        let m = metrics(serde_json::json!({
            "metadata": {"name": "web-7d9c", "namespace": "tenant-a"},
            "timestamp": "2026-10-16T10:00:00Z",
            "window": "30s",
            "containers": [
                {"name": "web", "usage": {"cpu": "12500000n", "memory": "65536Ki"}},
                {"name": "proxy", "usage": {"cpu": "1", "memory": "1Gi"}}
            ]
        }));

        let usage = m.usage().unwrap();
        assert_eq!(usage.cpu, 12.5);
        assert_eq!(usage.memory, 64 * 1024 * 1024);
        assert_eq!(usage.network_in, 0);
        assert_eq!(usage.network_out, 0);
    }

    #[test]
    fn test_missing_container_entry() {
        let m = metrics(serde_json::json!({
            "metadata": {"name": "web-7d9c"},
            "containers": []
        }));

        assert!(matches!(
            m.usage(),
            Err(Error::MissingContainerMetrics { pod }) if pod == "web-7d9c"
        ));
    }

    #[test]
    fn test_malformed_usage_quantity() {
        let m = metrics(serde_json::json!({
            "metadata": {"name": "web-7d9c"},
            "containers": [{"name": "web", "usage": {"cpu": "lots", "memory": "1Mi"}}]
        }));

        assert!(matches!(
            m.usage(),
            Err(Error::Quantity(QuantityError::Cpu(q))) if q == "lots"
        ));
    }
}
