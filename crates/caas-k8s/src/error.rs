use crate::quantity::QuantityError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to load kubeconfig")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("failed to load in-cluster config")]
    InCluster(#[from] kube::config::InClusterError),

    #[error("failed to create kubernetes client")]
    Client(#[source] kube::Error),

    /// A cluster mutation failed; `source` is the error returned by the API
    #[error("failed to {action}")]
    Api {
        action: String,
        #[source]
        source: kube::Error,
    },

    #[error("no container metrics reported for pod '{pod}'")]
    MissingContainerMetrics { pod: String },

    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

impl Error {
    pub(crate) fn api(action: impl Into<String>, source: kube::Error) -> Self {
        Self::Api {
            action: action.into(),
            source,
        }
    }

    /// Whether the API server answered 404 for the request
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Api {
                source: kube::Error::Api(response),
                ..
            } if response.code == 404
        )
    }
}
