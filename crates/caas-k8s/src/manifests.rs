//! Builders for the Kubernetes objects backing a deployed application

use std::collections::BTreeMap;

use caas_types::{AppSpec, ResourceLimits};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Namespace, PodSpec, PodTemplateSpec, ResourceRequirements,
    Service, ServicePort, ServiceSpec,
};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::error::Result;
use crate::quantity::{parse_cpu_usage, parse_memory_usage};

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "caas";
pub const CLUSTER_ISSUER_ANNOTATION: &str = "cert-manager.io/cluster-issuer";

/// Port exposed by the service in front of every application
pub const SERVICE_PORT: i32 = 80;

/// How ingresses are exposed by the cluster
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressOptions {
    pub class_name: Option<String>,
    /// cert-manager cluster issuer used to provision the TLS certificate
    pub cluster_issuer: Option<String>,
    pub tls: bool,
}

/// Label selector matching every object created by caas
pub fn managed_selector() -> String {
    format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY)
}

fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), app.to_string()),
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string()),
    ])
}

fn selector_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                MANAGED_BY.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Container limits, rejecting quantities that would not normalize
fn resource_requirements(limits: &ResourceLimits) -> Result<Option<ResourceRequirements>> {
    if limits.is_empty() {
        return Ok(None);
    }

    let mut map = BTreeMap::new();
    if let Some(cpu) = &limits.cpu {
        parse_cpu_usage(cpu)?;
        map.insert("cpu".to_string(), Quantity(cpu.trim().to_string()));
    }
    if let Some(memory) = &limits.memory {
        parse_memory_usage(memory)?;
        map.insert("memory".to_string(), Quantity(memory.trim().to_string()));
    }

    Ok(Some(ResourceRequirements {
        limits: Some(map),
        ..Default::default()
    }))
}

pub fn deployment(app: &AppSpec) -> Result<Deployment> {
    let env = app
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    let container = Container {
        name: app.name.clone(),
        image: Some(app.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: app.port,
            name: Some("http".to_string()),
            ..Default::default()
        }]),
        env: (!env.is_empty()).then_some(env),
        resources: resource_requirements(&app.limits)?,
        ..Default::default()
    };

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            labels: Some(app_labels(&app.name)),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(app.replicas),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&app.name)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(app_labels(&app.name)),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

pub fn service(app: &AppSpec) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            labels: Some(app_labels(&app.name)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(selector_labels(&app.name)),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(app.port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ingress routing `host/` to the application's service; `None` without a host
pub fn ingress(app: &AppSpec, options: &IngressOptions) -> Option<Ingress> {
    let host = app.host.clone()?;

    let annotations = options.cluster_issuer.as_ref().map(|issuer| {
        BTreeMap::from([(CLUSTER_ISSUER_ANNOTATION.to_string(), issuer.clone())])
    });

    let tls = options.tls.then(|| {
        vec![IngressTLS {
            hosts: Some(vec![host.clone()]),
            secret_name: Some(format!("{}-tls", app.name)),
        }]
    });

    let backend = IngressBackend {
        service: Some(IngressServiceBackend {
            name: app.name.clone(),
            port: Some(ServiceBackendPort {
                number: Some(SERVICE_PORT),
                ..Default::default()
            }),
        }),
        ..Default::default()
    };

    Some(Ingress {
        metadata: ObjectMeta {
            name: Some(app.name.clone()),
            labels: Some(app_labels(&app.name)),
            annotations,
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: options.class_name.clone(),
            rules: Some(vec![IngressRule {
                host: Some(host),
                http: Some(HTTPIngressRuleValue {
                    paths: vec![HTTPIngressPath {
                        path: Some("/".to_string()),
                        path_type: "Prefix".to_string(),
                        backend,
                    }],
                }),
            }]),
            tls,
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::quantity::QuantityError;

    fn app() -> AppSpec {
        AppSpec::new("shop", "ghcr.io/acme/shop:1.4.0", 3000)
            .with_replicas(2)
            .with_env("NODE_ENV", "production")
            .with_env("PORT", "3000")
    }

    #[test]
    fn test_namespace_is_labeled() {
        let ns = namespace("tenant-42");
        assert_eq!(ns.metadata.name.as_deref(), Some("tenant-42"));
        assert_eq!(
            ns.metadata.labels.unwrap().get(MANAGED_BY_LABEL).map(String::as_str),
            Some(MANAGED_BY)
        );
    }

    #[test]
    fn test_managed_selector() {
        assert_eq!(managed_selector(), "app.kubernetes.io/managed-by=caas");
    }

    #[test]
    fn test_deployment_selector_matches_pod_labels() {
        let deploy = deployment(&app()).unwrap();
        let spec = deploy.spec.unwrap();

        assert_eq!(spec.replicas, Some(2));
        let selector = spec.selector.match_labels.unwrap();
        let pod_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert!(selector.iter().all(|(k, v)| pod_labels.get(k) == Some(v)));
        assert_eq!(selector.get("app").map(String::as_str), Some("shop"));
    }

    #[test]
    fn test_deployment_container() {
        let deploy = deployment(&app()).unwrap();
        let pod = deploy.spec.unwrap().template.spec.unwrap();
        let container = &pod.containers[0];

        assert_eq!(container.name, "shop");
        assert_eq!(container.image.as_deref(), Some("ghcr.io/acme/shop:1.4.0"));
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 3000);

        let env = container.env.as_ref().unwrap();
        let names: Vec<_> = env.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["NODE_ENV", "PORT"]);
        assert!(container.resources.is_none());
    }

    #[test]
    fn test_deployment_limits() {
        let app = app().with_limits(ResourceLimits {
            cpu: Some("500m".to_string()),
            memory: Some("256Mi".to_string()),
        });
        let deploy = deployment(&app).unwrap();
        let pod = deploy.spec.unwrap().template.spec.unwrap();
        let limits = pod.containers[0]
            .resources
            .as_ref()
            .unwrap()
            .limits
            .as_ref()
            .unwrap();

        assert_eq!(limits.get("cpu"), Some(&Quantity("500m".to_string())));
        assert_eq!(limits.get("memory"), Some(&Quantity("256Mi".to_string())));
    }

    #[test]
    fn test_deployment_rejects_malformed_limits() {
        let app = app().with_limits(ResourceLimits {
            cpu: None,
            memory: Some("a lot".to_string()),
        });

        assert!(matches!(
            deployment(&app),
            Err(Error::Quantity(QuantityError::Memory(_)))
        ));
    }

    #[test]
    fn test_service_targets_container_port() {
        let svc = service(&app());
        let spec = svc.spec.unwrap();
        let port = &spec.ports.unwrap()[0];

        assert_eq!(port.port, SERVICE_PORT);
        assert_eq!(port.target_port, Some(IntOrString::Int(3000)));
        assert_eq!(
            spec.selector.unwrap().get("app").map(String::as_str),
            Some("shop")
        );
    }

    #[test]
    fn test_no_ingress_without_host() {
        assert!(ingress(&app(), &IngressOptions::default()).is_none());
    }

    #[test]
    fn test_ingress_rule_and_tls() {
        let app = app().with_host("shop.apps.example.com");
        let options = IngressOptions {
            class_name: Some("nginx".to_string()),
            cluster_issuer: Some("letsencrypt".to_string()),
            tls: true,
        };
        let ing = ingress(&app, &options).unwrap();

        assert_eq!(
            ing.metadata
                .annotations
                .unwrap()
                .get(CLUSTER_ISSUER_ANNOTATION)
                .map(String::as_str),
            Some("letsencrypt")
        );

        let spec = ing.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nginx"));

        let rule = &spec.rules.unwrap()[0];
        assert_eq!(rule.host.as_deref(), Some("shop.apps.example.com"));
        let path = &rule.http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/"));
        assert_eq!(path.path_type, "Prefix");
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "shop");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(SERVICE_PORT));

        let tls = &spec.tls.unwrap()[0];
        assert_eq!(tls.secret_name.as_deref(), Some("shop-tls"));
        assert_eq!(tls.hosts.as_deref(), Some(&["shop.apps.example.com".to_string()][..]));
    }
}
