use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for reaching the cluster and loading snapshots
#[derive(Error, Debug, Diagnostic)]
pub enum ClusterError {
    /// Target pod is not in the snapshot
    #[error("Pod not found: {namespace}/{name}")]
    #[diagnostic(
        code(whypending::cluster::pod_not_found),
        help("Check the namespace and pod name. Run: kubectl get pods -n {namespace}")
    )]
    PodNotFound {
        #[allow(unused)]
        namespace: String,
        #[allow(unused)]
        name: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(whypending::cluster::invalid_config), help("{suggestion}"))]
    InvalidConfig {
        #[allow(unused)]
        message: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Reading a local file failed
    #[error("Failed to read {}", .path.display())]
    #[diagnostic(
        code(whypending::cluster::io_error),
        help("Verify the file exists and is readable")
    )]
    Io {
        #[allow(unused)]
        path: PathBuf,
        #[source]
        #[allow(unused)]
        source: std::io::Error,
    },

    /// A list call against the API server failed
    #[error("Listing {resource} failed: {source}")]
    #[diagnostic(
        code(whypending::cluster::api_error),
        help("Verify the API server is reachable and that your user may list {resource}")
    )]
    Api {
        #[allow(unused)]
        resource: String,
        #[source]
        #[allow(unused)]
        source: kube::Error,
    },

    /// A document could not be decoded
    #[error("Failed to parse {what}: {message}")]
    #[diagnostic(
        code(whypending::cluster::parse_error),
        help("Snapshot files must be Kubernetes objects or Lists, e.g. the output of kubectl get pods,nodes -A -o yaml")
    )]
    ParseError {
        #[allow(unused)]
        what: String,
        #[allow(unused)]
        message: String,
    },
}

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    pub fn pod_not_found(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::PodNotFound {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn api(resource: impl Into<String>, source: kube::Error) -> Self {
        Self::Api {
            resource: resource.into(),
            source,
        }
    }

    pub fn parse_error(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            what: what.into(),
            message: message.into(),
        }
    }
}
