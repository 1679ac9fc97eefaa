//! Terraform plugin protocol service implementation
//!
//! Each RPC decodes JSON `DynamicValue` payloads into state values, runs
//! the matching [`ManagedResource`] callback, and reports failures as
//! diagnostics rather than gRPC errors, the way Terraform expects.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Notify, RwLock};
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use crate::client::KubeTrainingClient;
use crate::proto::tfplugin6;
use crate::provider::{self, ManagedResource, Provider};

use tfplugin6::provider_server::Provider as ProviderRpc;

/// The gRPC service Terraform drives
pub struct ProviderService {
    provider: Provider,
    client: RwLock<Option<Arc<KubeTrainingClient>>>,
    shutdown: Arc<Notify>,
}

impl ProviderService {
    /// A service with no cluster connection yet; `ConfigureProvider`
    /// establishes one.
    pub fn new(provider: Provider, shutdown: Arc<Notify>) -> Self {
        Self {
            provider,
            client: RwLock::new(None),
            shutdown,
        }
    }

    async fn configured_client(&self) -> Result<Arc<KubeTrainingClient>, tfplugin6::Diagnostic> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| error_diag("provider is not configured"))
    }

    fn resource(&self, type_name: &str) -> Result<&dyn ManagedResource, tfplugin6::Diagnostic> {
        self.provider
            .resource(type_name)
            .map_err(|e| error_diag(e.to_string()))
    }
}

/// An error-severity diagnostic with the given summary
fn error_diag(summary: impl Into<String>) -> tfplugin6::Diagnostic {
    tfplugin6::Diagnostic {
        severity: tfplugin6::diagnostic::Severity::Error as i32,
        summary: summary.into(),
        detail: String::new(),
        attribute: None,
    }
}

/// Decode a `DynamicValue` into JSON. Absent or empty values decode to
/// null; msgpack payloads are rejected since this provider only negotiates
/// the JSON encoding.
fn decode(value: Option<&tfplugin6::DynamicValue>) -> Result<Value, tfplugin6::Diagnostic> {
    let Some(value) = value else {
        return Ok(Value::Null);
    };
    if value.json.is_empty() {
        if !value.msgpack.is_empty() {
            return Err(error_diag("unsupported msgpack-encoded value"));
        }
        return Ok(Value::Null);
    }
    serde_json::from_slice(&value.json)
        .map_err(|e| error_diag(format!("decoding dynamic value: {e}")))
}

/// Encode JSON as a `DynamicValue`
fn encode(value: &Value) -> tfplugin6::DynamicValue {
    tfplugin6::DynamicValue {
        msgpack: Vec::new(),
        // Serializing a Value cannot fail
        json: serde_json::to_vec(value).unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl ProviderRpc for ProviderService {
    async fn get_provider_schema(
        &self,
        _request: Request<tfplugin6::get_provider_schema::Request>,
    ) -> Result<Response<tfplugin6::get_provider_schema::Response>, Status> {
        debug!("serving provider schema");
        let resource_schemas = self
            .provider
            .resource_schemas()
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema.to_proto()))
            .collect();

        Ok(Response::new(tfplugin6::get_provider_schema::Response {
            provider: Some(self.provider.provider_schema().to_proto()),
            resource_schemas,
            data_source_schemas: Default::default(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(tfplugin6::ServerCapabilities {
                plan_destroy: false,
                get_provider_schema_optional: false,
            }),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<tfplugin6::validate_provider_config::Request>,
    ) -> Result<Response<tfplugin6::validate_provider_config::Response>, Status> {
        let diagnostics = match decode(request.get_ref().config.as_ref()) {
            Ok(_) => vec![],
            Err(diag) => vec![diag],
        };
        Ok(Response::new(
            tfplugin6::validate_provider_config::Response { diagnostics },
        ))
    }

    async fn validate_resource_config(
        &self,
        request: Request<tfplugin6::validate_resource_config::Request>,
    ) -> Result<Response<tfplugin6::validate_resource_config::Response>, Status> {
        let request = request.get_ref();
        let diagnostics = match self.resource(&request.type_name) {
            Ok(_) => match decode(request.config.as_ref()) {
                Ok(_) => vec![],
                Err(diag) => vec![diag],
            },
            Err(diag) => vec![diag],
        };
        Ok(Response::new(
            tfplugin6::validate_resource_config::Response { diagnostics },
        ))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<tfplugin6::upgrade_resource_state::Request>,
    ) -> Result<Response<tfplugin6::upgrade_resource_state::Response>, Status> {
        // All schemas are at version 0; stored state passes through as-is.
        let raw = request
            .into_inner()
            .raw_state
            .map(|raw| raw.json)
            .unwrap_or_default();
        let upgraded = tfplugin6::DynamicValue {
            msgpack: Vec::new(),
            json: if raw.is_empty() { b"null".to_vec() } else { raw },
        };
        Ok(Response::new(tfplugin6::upgrade_resource_state::Response {
            upgraded_state: Some(upgraded),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<tfplugin6::configure_provider::Request>,
    ) -> Result<Response<tfplugin6::configure_provider::Response>, Status> {
        let request = request.get_ref();
        info!(terraform_version = %request.terraform_version, "configuring provider");

        let diagnostics = match decode(request.config.as_ref()) {
            Ok(config) => match provider::configure(&config).await {
                Ok(client) => {
                    *self.client.write().await = Some(Arc::new(client));
                    vec![]
                }
                Err(e) => vec![error_diag(e.to_string())],
            },
            Err(diag) => vec![diag],
        };
        Ok(Response::new(tfplugin6::configure_provider::Response {
            diagnostics,
        }))
    }

    async fn read_resource(
        &self,
        request: Request<tfplugin6::read_resource::Request>,
    ) -> Result<Response<tfplugin6::read_resource::Response>, Status> {
        let request = request.into_inner();
        let respond = |new_state, diagnostics| {
            Ok(Response::new(tfplugin6::read_resource::Response {
                new_state: Some(new_state),
                diagnostics,
                private: request.private.clone(),
            }))
        };

        let outcome = async {
            let client = self.configured_client().await?;
            let resource = self.resource(&request.type_name)?;
            let state = decode(request.current_state.as_ref())?;
            resource
                .read(client.as_ref(), &state)
                .await
                .map_err(|e| error_diag(e.to_string()))
        }
        .await;

        match outcome {
            Ok(Some(state)) => respond(encode(&state), vec![]),
            // Gone from the cluster; null state tells Terraform to forget it.
            Ok(None) => respond(encode(&Value::Null), vec![]),
            Err(diag) => respond(encode(&Value::Null), vec![diag]),
        }
    }

    async fn plan_resource_change(
        &self,
        request: Request<tfplugin6::plan_resource_change::Request>,
    ) -> Result<Response<tfplugin6::plan_resource_change::Response>, Status> {
        // Terraform core already merged config into the proposed state; the
        // provider has no plan-time modifications to add, so the proposal
        // passes through unchanged.
        let request = request.into_inner();
        let diagnostics = match self.resource(&request.type_name) {
            Ok(_) => vec![],
            Err(diag) => vec![diag],
        };
        Ok(Response::new(tfplugin6::plan_resource_change::Response {
            planned_state: request.proposed_new_state,
            requires_replace: vec![],
            planned_private: request.prior_private,
            diagnostics,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<tfplugin6::apply_resource_change::Request>,
    ) -> Result<Response<tfplugin6::apply_resource_change::Response>, Status> {
        let request = request.into_inner();

        let outcome = async {
            let client = self.configured_client().await?;
            let resource = self.resource(&request.type_name)?;
            let prior = decode(request.prior_state.as_ref())?;
            let planned = decode(request.planned_state.as_ref())?;

            let new_state = match (prior.is_null(), planned.is_null()) {
                // No prior object: create.
                (true, false) => resource
                    .create(client.as_ref(), &planned)
                    .await
                    .map_err(|e| error_diag(e.to_string()))?,
                // Planned away: destroy.
                (false, true) => {
                    resource
                        .delete(client.as_ref(), &prior)
                        .await
                        .map_err(|e| error_diag(e.to_string()))?;
                    Value::Null
                }
                (false, false) => resource
                    .update(client.as_ref(), &prior, &planned)
                    .await
                    .map_err(|e| error_diag(e.to_string()))?,
                (true, true) => Value::Null,
            };
            Ok(new_state)
        }
        .await;

        let (new_state, diagnostics) = match outcome {
            Ok(state) => (state, vec![]),
            Err(diag) => (Value::Null, vec![diag]),
        };
        Ok(Response::new(tfplugin6::apply_resource_change::Response {
            new_state: Some(encode(&new_state)),
            private: request.planned_private,
            diagnostics,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<tfplugin6::import_resource_state::Request>,
    ) -> Result<Response<tfplugin6::import_resource_state::Response>, Status> {
        let request = request.into_inner();
        info!(type_name = %request.type_name, id = %request.id, "importing resource");

        let outcome = async {
            let client = self.configured_client().await?;
            let resource = self.resource(&request.type_name)?;
            resource
                .import(client.as_ref(), &request.id)
                .await
                .map_err(|e| error_diag(e.to_string()))
        }
        .await;

        let (imported, diagnostics) = match outcome {
            Ok(Some(state)) => (
                vec![tfplugin6::import_resource_state::ImportedResource {
                    type_name: request.type_name,
                    state: Some(encode(&state)),
                    private: Vec::new(),
                }],
                vec![],
            ),
            Ok(None) => (
                vec![],
                vec![error_diag(format!(
                    "no object found for id {:?}",
                    request.id
                ))],
            ),
            Err(diag) => (vec![], vec![diag]),
        };
        Ok(Response::new(tfplugin6::import_resource_state::Response {
            imported_resources: imported,
            diagnostics,
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<tfplugin6::stop_provider::Request>,
    ) -> Result<Response<tfplugin6::stop_provider::Response>, Status> {
        warn!("stop requested, shutting down");
        self.shutdown.notify_one();
        Ok(Response::new(tfplugin6::stop_provider::Response {
            error: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> ProviderService {
        ProviderService::new(Provider::new(), Arc::new(Notify::new()))
    }

    fn json_value(bytes: &[u8]) -> tfplugin6::DynamicValue {
        tfplugin6::DynamicValue {
            msgpack: Vec::new(),
            json: bytes.to_vec(),
        }
    }

    #[test]
    fn decoding_prefers_json_and_rejects_msgpack() {
        assert_eq!(decode(None).unwrap(), Value::Null);
        assert_eq!(decode(Some(&json_value(b"null"))).unwrap(), Value::Null);
        assert_eq!(
            decode(Some(&json_value(b"{\"id\":\"a/b\"}"))).unwrap(),
            json!({"id": "a/b"})
        );

        let msgpack = tfplugin6::DynamicValue {
            msgpack: vec![0xc0],
            json: Vec::new(),
        };
        assert!(decode(Some(&msgpack)).is_err());
    }

    #[tokio::test]
    async fn schema_response_covers_every_resource() {
        let response = service()
            .get_provider_schema(Request::new(tfplugin6::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.provider.is_some());
        assert_eq!(response.resource_schemas.len(), 5);
        assert!(response.resource_schemas.contains_key("kubeflow_pytorch_job"));
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn unknown_resource_types_are_diagnosed() {
        let response = service()
            .validate_resource_config(Request::new(
                tfplugin6::validate_resource_config::Request {
                    type_name: "kubeflow_mx_job".into(),
                    config: Some(json_value(b"{}")),
                },
            ))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("kubeflow_mx_job"));
    }

    #[tokio::test]
    async fn upgrade_passes_stored_state_through() {
        let response = service()
            .upgrade_resource_state(Request::new(tfplugin6::upgrade_resource_state::Request {
                type_name: "kubeflow_tf_job".into(),
                version: 0,
                raw_state: Some(tfplugin6::RawState {
                    json: b"{\"id\":\"a/b\"}".to_vec(),
                    flatmap: Default::default(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.upgraded_state.unwrap().json, b"{\"id\":\"a/b\"}");
    }

    #[tokio::test]
    async fn plan_passes_the_proposal_through() {
        let proposed = json_value(b"{\"metadata\":[{\"name\":\"x\"}]}");
        let response = service()
            .plan_resource_change(Request::new(tfplugin6::plan_resource_change::Request {
                type_name: "kubeflow_tf_job".into(),
                prior_state: None,
                proposed_new_state: Some(proposed.clone()),
                config: None,
                prior_private: vec![1, 2],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.planned_state.unwrap().json, proposed.json);
        assert_eq!(response.planned_private, vec![1, 2]);
    }

    #[tokio::test]
    async fn unconfigured_provider_diagnoses_instead_of_crashing() {
        let response = service()
            .read_resource(Request::new(tfplugin6::read_resource::Request {
                type_name: "kubeflow_tf_job".into(),
                current_state: Some(json_value(b"{\"id\":\"a/b\"}")),
                private: Vec::new(),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("not configured"));
    }
}
