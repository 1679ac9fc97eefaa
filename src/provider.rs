//! Provider registry and Kubernetes client configuration
//!
//! The provider owns one [`ManagedResource`] per training job kind, keyed
//! by its Terraform type name, plus the provider-level configuration block
//! that selects the kubeconfig and context to talk to the cluster with.

use std::collections::BTreeMap;

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use tracing::info;

use crate::client::{KubeTrainingClient, TrainingClient};
use crate::resource::{
    MpiJobResource, PaddleJobResource, PyTorchJobResource, TfJobResource, XgboostJobResource,
};
use crate::schema::{self, Attribute, AttributeType, Block, Schema};
use crate::{Error, Result};

/// Lifecycle callbacks for one resource type.
///
/// State values are JSON in Terraform's nesting convention. `create` and
/// `update` return the new state, `read` returns `None` when the backing
/// object no longer exists.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// Terraform resource type name, e.g. `kubeflow_tf_job`
    fn type_name(&self) -> &'static str;

    /// The resource's schema
    fn schema(&self) -> Schema;

    /// Create the object and wait for it to reach its target phase
    async fn create(&self, client: &dyn TrainingClient, state: &Value) -> Result<Value>;

    /// Refresh state from the cluster; `None` marks the object as gone
    async fn read(&self, client: &dyn TrainingClient, state: &Value) -> Result<Option<Value>>;

    /// Apply metadata changes and return the refreshed state
    async fn update(
        &self,
        client: &dyn TrainingClient,
        prior: &Value,
        planned: &Value,
    ) -> Result<Value>;

    /// Delete the object and wait for it to disappear
    async fn delete(&self, client: &dyn TrainingClient, state: &Value) -> Result<()>;

    /// Whether the backing object currently exists
    async fn exists(&self, client: &dyn TrainingClient, state: &Value) -> Result<bool>;

    /// Import by composite ID, defaulting to a read with only the ID set
    async fn import(&self, client: &dyn TrainingClient, id: &str) -> Result<Option<Value>> {
        let state = serde_json::json!({ "id": id });
        self.read(client, &state).await
    }
}

/// The set of resources this provider serves
pub struct Provider {
    resources: BTreeMap<&'static str, Box<dyn ManagedResource>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    /// A provider with all five training job kinds registered
    pub fn new() -> Self {
        let mut resources: BTreeMap<&'static str, Box<dyn ManagedResource>> = BTreeMap::new();
        for resource in [
            Box::new(TfJobResource) as Box<dyn ManagedResource>,
            Box::new(PyTorchJobResource),
            Box::new(MpiJobResource),
            Box::new(XgboostJobResource),
            Box::new(PaddleJobResource),
        ] {
            resources.insert(resource.type_name(), resource);
        }
        Self { resources }
    }

    /// Look up a resource by its Terraform type name
    pub fn resource(&self, type_name: &str) -> Result<&dyn ManagedResource> {
        self.resources
            .get(type_name)
            .map(Box::as_ref)
            .ok_or_else(|| Error::validation(format!("unknown resource type {type_name:?}")))
    }

    /// All resource schemas, keyed by type name
    pub fn resource_schemas(&self) -> BTreeMap<&'static str, Schema> {
        self.resources
            .iter()
            .map(|(name, resource)| (*name, resource.schema()))
            .collect()
    }

    /// The provider configuration block
    pub fn provider_schema(&self) -> Schema {
        Schema {
            version: 0,
            block: Block {
                description: "Manages Kubeflow training jobs on a Kubernetes cluster.",
                attributes: vec![
                    Attribute::optional(
                        "kubeconfig",
                        AttributeType::String,
                        "Path to a kubeconfig file. Defaults to in-cluster or \
                         ambient configuration.",
                    ),
                    Attribute::optional(
                        "context",
                        AttributeType::String,
                        "Kubeconfig context to use. Defaults to the current context.",
                    ),
                ],
                blocks: vec![],
            },
        }
    }
}

/// Build the Kubernetes client from the provider configuration block.
///
/// An explicit `kubeconfig` path wins; otherwise configuration is inferred
/// from the environment the way kubectl would (KUBECONFIG, ~/.kube/config,
/// in-cluster service account).
pub async fn configure(config: &Value) -> Result<KubeTrainingClient> {
    let kubeconfig = schema::str_field(config, "kubeconfig");
    let context = schema::str_field(config, "context").map(str::to_string);

    let client_config = match kubeconfig {
        Some(path) => {
            info!(path = %path, "loading kubeconfig");
            let kc = Kubeconfig::read_from(path)
                .map_err(|e| Error::Config(format!("reading kubeconfig {path:?}: {e}")))?;
            let options = KubeConfigOptions {
                context,
                ..KubeConfigOptions::default()
            };
            Config::from_custom_kubeconfig(kc, &options)
                .await
                .map_err(|e| Error::Config(format!("interpreting kubeconfig {path:?}: {e}")))?
        }
        None => Config::infer()
            .await
            .map_err(|e| Error::Config(format!("inferring kubernetes config: {e}")))?,
    };

    let client = Client::try_from(client_config)?;
    Ok(KubeTrainingClient::new(client))
}
