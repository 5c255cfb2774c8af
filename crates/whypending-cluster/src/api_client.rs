use crate::error::{ClusterError, Result};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use std::env;
use std::fmt::Debug;
use tracing::{debug, info};

/// Page size requested from list endpoints
pub const PAGE_LIMIT: u32 = 500;

/// Read-only client for the Kubernetes API server
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve cluster settings and build a client
    pub async fn connect(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Self> {
        let config = resolve_config(kubeconfig, context).await?;
        info!("Connecting to {}", config.cluster_url);
        let client = Client::try_from(config).map_err(|e| {
            ClusterError::invalid_config(
                format!("failed to build client: {}", e),
                "Check the TLS and credential settings of the selected cluster",
            )
        })?;
        Ok(Self::new(client))
    }

    /// List every object of a kind across all namespaces, following
    /// `continue` tokens until exhausted
    pub async fn list<K>(&self) -> Result<Vec<K>>
    where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::all(self.client.clone());
        let plural = K::plural(&()).to_string();
        let mut params = ListParams::default().limit(PAGE_LIMIT);
        let mut items = Vec::new();

        loop {
            debug!(
                "Listing {} (continue: {})",
                plural,
                params.continue_token.is_some()
            );
            let page = api
                .list(&params)
                .await
                .map_err(|e| ClusterError::api(&plural, e))?;
            items.extend(page.items);

            match page.metadata.continue_.filter(|c| !c.is_empty()) {
                Some(token) => params = params.continue_token(&token),
                None => break,
            }
        }

        Ok(items)
    }
}

/// Pick the cluster configuration
///
/// An explicit kubeconfig (a path list in `KUBECONFIG` form) wins; a context
/// alone selects from the default kubeconfig; otherwise kubeconfig and the
/// in-cluster service account are tried in that order.
pub async fn resolve_config(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Config> {
    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        cluster: None,
        user: None,
    };

    if let Some(paths) = kubeconfig.filter(|p| !p.is_empty()) {
        let merged = read_kubeconfig(paths)?;
        return config_from_kubeconfig(merged, &options).await;
    }

    if context.is_some() {
        return Config::from_kubeconfig(&options).await.map_err(|e| {
            ClusterError::invalid_config(
                e.to_string(),
                "Run: kubectl config get-contexts to list the available contexts",
            )
        });
    }

    Config::infer().await.map_err(|e| {
        ClusterError::invalid_config(
            format!("no cluster configuration found: {}", e),
            "Pass --kubeconfig, set KUBECONFIG, create ~/.kube/config, or use --snapshot <file> to diagnose offline",
        )
    })
}

/// Build a configuration from an already loaded kubeconfig
pub async fn config_from_kubeconfig(
    kubeconfig: Kubeconfig,
    options: &KubeConfigOptions,
) -> Result<Config> {
    Config::from_custom_kubeconfig(kubeconfig, options)
        .await
        .map_err(|e| {
            ClusterError::invalid_config(
                e.to_string(),
                "Check current-context and the cluster and user entries it names",
            )
        })
}

/// Read and merge the existing files of a `KUBECONFIG` style path list;
/// earlier files win
pub fn read_kubeconfig(paths: &str) -> Result<Kubeconfig> {
    let mut merged: Option<Kubeconfig> = None;

    for path in env::split_paths(paths).filter(|p| p.is_file()) {
        debug!("Reading kubeconfig {}", path.display());
        let next = Kubeconfig::read_from(&path).map_err(|e| {
            ClusterError::invalid_config(
                format!("{}: {}", path.display(), e),
                "Verify the kubeconfig is valid YAML",
            )
        })?;
        merged = Some(match merged {
            Some(current) => current.merge(next).map_err(|e| {
                ClusterError::invalid_config(e.to_string(), "Verify the kubeconfig files agree")
            })?,
            None => next,
        });
    }

    merged.ok_or_else(|| {
        ClusterError::invalid_config(
            format!("no kubeconfig file found in {}", paths),
            "Pass an existing file with --kubeconfig",
        )
    })
}
