//! Cluster configuration loading
//!
//! Chooses between the in-cluster service account and a local kubeconfig.

use std::time::Duration;

use caas_types::ContextInfo;
use kube::config::{KubeConfigOptions, Kubeconfig};
use tracing::debug;

use crate::error::Result;

/// Environment variable set by the kubelet inside every pod
const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";

/// Where the cluster connection settings come from
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ClusterSource {
    /// In-cluster when running inside a pod, local kubeconfig otherwise
    #[default]
    Auto,
    InCluster,
    /// Local kubeconfig, optionally pinned to a context other than the current one
    Kubeconfig { context: Option<String> },
}

impl ClusterSource {
    /// Resolve `Auto` using the process environment
    pub fn resolve(&self) -> ClusterSource {
        self.resolve_with(std::env::var_os(SERVICE_HOST_ENV).is_some())
    }

    fn resolve_with(&self, in_cluster: bool) -> ClusterSource {
        match self {
            Self::Auto if in_cluster => Self::InCluster,
            Self::Auto => Self::Kubeconfig { context: None },
            other => other.clone(),
        }
    }
}

/// Client-side timeouts applied on top of the loaded config
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientOptions {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

/// Load a `kube::Config` for the given source
pub async fn load_config(source: &ClusterSource, options: &ClientOptions) -> Result<kube::Config> {
    let mut config = match source.resolve() {
        ClusterSource::InCluster => {
            debug!("loading in-cluster config");
            kube::Config::incluster()?
        }
        ClusterSource::Kubeconfig { context } => from_kubeconfig(context).await?,
        ClusterSource::Auto => from_kubeconfig(None).await?,
    };

    if options.connect_timeout.is_some() {
        config.connect_timeout = options.connect_timeout;
    }
    if options.read_timeout.is_some() {
        config.read_timeout = options.read_timeout;
    }

    Ok(config)
}

async fn from_kubeconfig(context: Option<String>) -> Result<kube::Config> {
    debug!(context = ?context, "loading kubeconfig");
    let options = KubeConfigOptions {
        context,
        ..Default::default()
    };
    Ok(kube::Config::from_kubeconfig(&options).await?)
}

/// Get all available contexts from the local kubeconfig
pub fn list_contexts() -> Result<Vec<ContextInfo>> {
    let kubeconfig = Kubeconfig::read()?;
    Ok(contexts_from(&kubeconfig))
}

fn contexts_from(kubeconfig: &Kubeconfig) -> Vec<ContextInfo> {
    let current = kubeconfig.current_context.as_ref();
    kubeconfig
        .contexts
        .iter()
        .map(|ctx| {
            let context = ctx.context.as_ref();
            ContextInfo::new(
                ctx.name.clone(),
                context.map(|c| c.cluster.clone()).unwrap_or_default(),
                context.and_then(|c| c.user.clone()).unwrap_or_default(),
                context.and_then(|c| c.namespace.clone()),
                Some(&ctx.name) == current,
            )
        })
        .collect()
}
