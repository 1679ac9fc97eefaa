//! Resource lifecycle callbacks for the five training job kinds
//!
//! Every kind follows the same shape: expand the configured state, call the
//! client, set the composite ID, poll the job's conditions until a terminal
//! phase, and read the object back into state. The kinds differ only in
//! which typed client methods and expand/flatten functions they call, so
//! the shared shape lives in [`job_resource!`] and the phase/ID helpers
//! here.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::api::{JobConditionType, JobStatus};
use crate::wait::WaitConfig;
use crate::{Error, Result, CREATE_TIMEOUT, DELETE_TIMEOUT};

mod mpi_job;
mod paddle_job;
mod pytorch_job;
mod tensorflow_job;
mod xgboost_job;

pub use mpi_job::MpiJobResource;
pub use paddle_job::PaddleJobResource;
pub use pytorch_job::PyTorchJobResource;
pub use tensorflow_job::TfJobResource;
pub use xgboost_job::XgboostJobResource;

/// Phase while the object or its conditions are not established yet
pub const PHASE_CREATING: &str = "Creating";
/// Phase once the operator acknowledged the job
pub const PHASE_CREATED: &str = "Created";
/// Phase while the job waits on pod scheduling
pub const PHASE_PENDING: &str = "Pending";
/// Phase while the job runs
pub const PHASE_RUNNING: &str = "Running";
/// Phase while failed replicas restart
pub const PHASE_RESTARTING: &str = "Restarting";
/// Terminal success phase
pub const PHASE_SUCCEEDED: &str = "Succeeded";
/// Terminal failure phase
pub const PHASE_FAILED: &str = "Failed";
/// Phase while a delete is in flight
pub const PHASE_DELETING: &str = "Deleting";
/// Pseudo-phase once the object is gone
pub const PHASE_REMOVED: &str = "Removed";

/// Build the composite Terraform ID (`namespace/name`) for an object
pub fn build_id(meta: &ObjectMeta) -> Result<String> {
    let name = meta
        .name
        .as_deref()
        .ok_or_else(|| Error::validation("object has no name"))?;
    let namespace = meta.namespace.as_deref().unwrap_or("default");
    Ok(format!("{namespace}/{name}"))
}

/// Split a composite ID back into namespace and name
pub fn parse_id(id: &str) -> Result<(&str, &str)> {
    match id.split_once('/') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace, name))
        }
        _ => Err(Error::InvalidId(id.to_string())),
    }
}

/// Derive the job's phase from its status conditions.
///
/// The condition list is scanned in order and the first matching
/// (type, status) pair wins, mirroring how the operator appends conditions
/// as the job progresses. A job with no conditions and no start time is
/// still being created.
pub fn job_phase(status: Option<&JobStatus>) -> &'static str {
    let Some(status) = status else {
        return PHASE_CREATING;
    };

    for condition in &status.conditions {
        match (condition.type_, condition.status.as_str()) {
            (JobConditionType::Succeeded, "True") => return PHASE_SUCCEEDED,
            (JobConditionType::Failed, "True") => return PHASE_FAILED,
            (JobConditionType::Running, "True") => return PHASE_RUNNING,
            (JobConditionType::Running, "False") => return PHASE_PENDING,
            (JobConditionType::Created, "True") => return PHASE_CREATED,
            (JobConditionType::Created, "False") => return PHASE_CREATING,
            (JobConditionType::Restarting, _) => return PHASE_RESTARTING,
            _ => {}
        }
    }

    PHASE_CREATING
}

/// Wait configuration for create: every non-terminal phase is pending,
/// `Succeeded` completes, anything else (notably `Failed`) errors.
pub fn create_wait_config() -> WaitConfig {
    WaitConfig::new(
        vec![
            PHASE_CREATING,
            PHASE_CREATED,
            PHASE_PENDING,
            PHASE_RUNNING,
            PHASE_RESTARTING,
        ],
        vec![PHASE_SUCCEEDED],
        CREATE_TIMEOUT,
    )
}

/// Wait configuration for delete: poll until the object is gone
pub fn delete_wait_config() -> WaitConfig {
    WaitConfig::new(vec![PHASE_DELETING], vec![PHASE_REMOVED], DELETE_TIMEOUT)
}

/// Implements [`crate::provider::ManagedResource`] for one job kind.
///
/// Parameters: resource struct, Terraform type name, kind label for logs,
/// schema module, and the four typed client methods.
macro_rules! job_resource {
    (
        $resource:ident,
        $type_name:literal,
        $kind:literal,
        $schema_mod:ident,
        $create:ident,
        $get:ident,
        $update:ident,
        $delete:ident
    ) => {
        /// Lifecycle callbacks for this job kind
        pub struct $resource;

        #[async_trait::async_trait]
        impl $crate::provider::ManagedResource for $resource {
            fn type_name(&self) -> &'static str {
                $type_name
            }

            fn schema(&self) -> $crate::schema::Schema {
                $crate::schema::$schema_mod::schema()
            }

            async fn create(
                &self,
                client: &dyn $crate::client::TrainingClient,
                state: &serde_json::Value,
            ) -> $crate::Result<serde_json::Value> {
                let job = $crate::schema::$schema_mod::expand(state)?;
                tracing::info!(kind = $kind, name = ?job.metadata.name, "creating job");
                let created = client.$create(&job).await?;
                let id = $crate::resource::build_id(&created.metadata)?;
                let (namespace, name) = $crate::resource::parse_id(&id)?;
                let (namespace, name) = (namespace.to_string(), name.to_string());

                let waited = $crate::wait::wait_for_state(
                    &$crate::resource::create_wait_config(),
                    concat!("create ", $kind),
                    || {
                        let namespace = namespace.clone();
                        let name = name.clone();
                        async move {
                            match client.$get(&namespace, &name).await {
                                Ok(job) => {
                                    let phase =
                                        $crate::resource::job_phase(job.status.as_ref());
                                    Ok((Some(job), phase.to_string()))
                                }
                                Err(e) if e.is_not_found() => {
                                    tracing::debug!(
                                        kind = $kind,
                                        name = %name,
                                        "job not visible yet"
                                    );
                                    Ok((None, $crate::resource::PHASE_CREATING.to_string()))
                                }
                                Err(e) => Err(e),
                            }
                        }
                    },
                )
                .await?;

                tracing::info!(kind = $kind, id = %id, "job succeeded");
                let final_job = waited.unwrap_or(created);
                let mut out = $crate::schema::$schema_mod::flatten(&final_job);
                out["id"] = serde_json::Value::String(id);
                Ok(out)
            }

            async fn read(
                &self,
                client: &dyn $crate::client::TrainingClient,
                state: &serde_json::Value,
            ) -> $crate::Result<Option<serde_json::Value>> {
                let id = $crate::resource::state_id(state)?;
                let (namespace, name) = $crate::resource::parse_id(&id)?;
                tracing::debug!(kind = $kind, id = %id, "reading job");

                match client.$get(namespace, name).await {
                    Ok(job) => {
                        let mut out = $crate::schema::$schema_mod::flatten(&job);
                        out["id"] = serde_json::Value::String(id.clone());
                        Ok(Some(out))
                    }
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e),
                }
            }

            async fn update(
                &self,
                client: &dyn $crate::client::TrainingClient,
                prior: &serde_json::Value,
                planned: &serde_json::Value,
            ) -> $crate::Result<serde_json::Value> {
                let id = $crate::resource::state_id(prior)?;
                let (namespace, name) = $crate::resource::parse_id(&id)?;

                let empty = serde_json::json!({});
                let old_meta =
                    $crate::schema::first_block(prior, "metadata").unwrap_or(&empty);
                let new_meta =
                    $crate::schema::first_block(planned, "metadata").unwrap_or(&empty);
                let ops = $crate::patch::metadata_patch_ops(old_meta, new_meta);

                if !ops.is_empty() {
                    tracing::info!(kind = $kind, id = %id, ops = ops.len(), "patching job");
                    let patch = $crate::patch::to_json_patch(&ops)?;
                    client.$update(namespace, name, patch).await?;
                }

                let job = client.$get(namespace, name).await?;
                let mut out = $crate::schema::$schema_mod::flatten(&job);
                out["id"] = serde_json::Value::String(id.clone());
                Ok(out)
            }

            async fn delete(
                &self,
                client: &dyn $crate::client::TrainingClient,
                state: &serde_json::Value,
            ) -> $crate::Result<()> {
                let id = $crate::resource::state_id(state)?;
                let (namespace, name) = $crate::resource::parse_id(&id)?;
                tracing::info!(kind = $kind, id = %id, "deleting job");
                client.$delete(namespace, name).await?;

                let (namespace, name) = (namespace.to_string(), name.to_string());
                $crate::wait::wait_for_state::<_, _, ()>(
                    &$crate::resource::delete_wait_config(),
                    concat!("delete ", $kind),
                    || {
                        let namespace = namespace.clone();
                        let name = name.clone();
                        async move {
                            match client.$get(&namespace, &name).await {
                                Ok(_) => Ok((
                                    None,
                                    $crate::resource::PHASE_DELETING.to_string(),
                                )),
                                Err(e) if e.is_not_found() => Ok((
                                    None,
                                    $crate::resource::PHASE_REMOVED.to_string(),
                                )),
                                Err(e) => Err(e),
                            }
                        }
                    },
                )
                .await?;

                tracing::info!(kind = $kind, id = %id, "job deleted");
                Ok(())
            }

            async fn exists(
                &self,
                client: &dyn $crate::client::TrainingClient,
                state: &serde_json::Value,
            ) -> $crate::Result<bool> {
                let id = $crate::resource::state_id(state)?;
                let (namespace, name) = $crate::resource::parse_id(&id)?;
                match client.$get(namespace, name).await {
                    Ok(_) => Ok(true),
                    Err(e) if e.is_not_found() => Ok(false),
                    Err(e) => Err(e),
                }
            }
        }
    };
}
pub(crate) use job_resource;

/// The composite ID stored in state
pub fn state_id(state: &serde_json::Value) -> Result<String> {
    state
        .get("id")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidId(String::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobCondition;

    #[test]
    fn ids_are_namespace_slash_name() {
        let meta = ObjectMeta {
            name: Some("mnist".into()),
            namespace: Some("training".into()),
            ..ObjectMeta::default()
        };
        assert_eq!(build_id(&meta).unwrap(), "training/mnist");

        let (namespace, name) = parse_id("training/mnist").unwrap();
        assert_eq!(namespace, "training");
        assert_eq!(name, "mnist");
    }

    #[test]
    fn nameless_metadata_cannot_build_an_id() {
        assert!(build_id(&ObjectMeta::default()).is_err());
    }

    #[test]
    fn missing_namespace_defaults_in_build_but_fails_parse() {
        let meta = ObjectMeta {
            name: Some("mnist".into()),
            ..ObjectMeta::default()
        };
        assert_eq!(build_id(&meta).unwrap(), "default/mnist");

        assert!(parse_id("mnist").is_err());
        assert!(parse_id("/mnist").is_err());
        assert!(parse_id("training/").is_err());
    }

    #[test]
    fn phase_derivation_scans_conditions_in_order() {
        assert_eq!(job_phase(None), PHASE_CREATING);
        assert_eq!(job_phase(Some(&JobStatus::default())), PHASE_CREATING);

        let status = JobStatus {
            conditions: vec![JobCondition::new(JobConditionType::Succeeded, "True")],
            ..JobStatus::default()
        };
        assert_eq!(job_phase(Some(&status)), PHASE_SUCCEEDED);

        let status = JobStatus {
            conditions: vec![
                JobCondition::new(JobConditionType::Created, "True"),
                JobCondition::new(JobConditionType::Running, "True"),
            ],
            ..JobStatus::default()
        };
        // First matching condition wins: Created=True was appended first.
        assert_eq!(job_phase(Some(&status)), PHASE_CREATED);

        let status = JobStatus {
            conditions: vec![JobCondition::new(JobConditionType::Running, "False")],
            ..JobStatus::default()
        };
        assert_eq!(job_phase(Some(&status)), PHASE_PENDING);

        let status = JobStatus {
            conditions: vec![JobCondition::new(JobConditionType::Failed, "True")],
            ..JobStatus::default()
        };
        assert_eq!(job_phase(Some(&status)), PHASE_FAILED);

        let status = JobStatus {
            conditions: vec![JobCondition::new(JobConditionType::Restarting, "Unknown")],
            ..JobStatus::default()
        };
        assert_eq!(job_phase(Some(&status)), PHASE_RESTARTING);
    }

    #[test]
    fn create_wait_treats_failed_as_unexpected() {
        let config = create_wait_config();
        assert!(config.pending.contains(&PHASE_RUNNING));
        assert!(!config.pending.contains(&PHASE_FAILED));
        assert_eq!(config.target, vec![PHASE_SUCCEEDED]);
        assert_eq!(config.timeout, CREATE_TIMEOUT);
    }
}
