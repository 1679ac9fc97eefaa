//! Schema and expand/flatten for `kubeflow_mpi_job`

use serde_json::{Map, Value};

use crate::api::{CleanPodPolicy, MPIJob, MPIJobSpec};
use crate::{Error, Result};

use super::common::{
    expand_replica_specs, expand_run_policy, expand_status, flatten_replica_specs,
    flatten_run_policy, flatten_status, replica_specs_block, run_policy_block, status_block,
};
use super::kubernetes::{expand_metadata, flatten_metadata, metadata_block};
use super::{
    first_block, i32_field, str_field, wrap_block, Attribute, AttributeType, Block, NestedBlock,
    Nesting, Schema,
};

/// Lowercase block names paired with the operator's replica types
pub const REPLICA_KEYS: [(&str, &str); 2] = [("launcher", "Launcher"), ("worker", "Worker")];

/// Resource schema for `kubeflow_mpi_job`
pub fn schema() -> Schema {
    Schema {
        version: 0,
        block: Block {
            description: "An MPI training job managed by the Kubeflow Training Operator.",
            attributes: vec![Attribute::computed(
                "id",
                AttributeType::String,
                "Composite resource ID in the form namespace/name.",
            )],
            blocks: vec![metadata_block(), spec_block(), status_block()],
        },
    }
}

fn spec_block() -> NestedBlock {
    NestedBlock {
        name: "spec",
        nesting: Nesting::Single,
        required: true,
        block: Block {
            description: "MPIJobSpec describes the desired state of the MPI training cluster.",
            attributes: vec![
                Attribute::optional(
                    "slots_per_worker",
                    AttributeType::Number,
                    "Number of processor slots each worker hosts. Defaults to 1.",
                ),
                Attribute::optional(
                    "clean_pod_policy",
                    AttributeType::String,
                    "Legacy pod cleanup policy predating run_policy: All, Running or None.",
                ),
            ],
            blocks: vec![
                run_policy_block(),
                replica_specs_block("mpi_replica_specs", &["launcher", "worker"]),
            ],
        },
    }
}

/// Expand Terraform state into a typed MPIJob
pub fn expand(state: &Value) -> Result<MPIJob> {
    let metadata = expand_metadata(state);
    let name = metadata
        .name
        .clone()
        .ok_or_else(|| Error::validation("mpi_job metadata requires a name"))?;

    let mut spec = MPIJobSpec::default();
    if let Some(spec_block) = first_block(state, "spec") {
        spec.run_policy = expand_run_policy(spec_block)?;
        spec.slots_per_worker = i32_field(spec_block, "slots_per_worker");
        spec.clean_pod_policy = match str_field(spec_block, "clean_pod_policy") {
            None => None,
            Some("All") => Some(CleanPodPolicy::All),
            Some("Running") => Some(CleanPodPolicy::Running),
            Some("None") => Some(CleanPodPolicy::None),
            Some(other) => {
                return Err(Error::validation(format!(
                    "invalid clean_pod_policy {other:?}, expected one of: All, Running, None"
                )))
            }
        };
        spec.mpi_replica_specs =
            expand_replica_specs(spec_block, "mpi_replica_specs", &REPLICA_KEYS)?;
    }

    let mut job = MPIJob::new(&name, spec);
    job.metadata = metadata;
    job.status = expand_status(state)?;
    Ok(job)
}

/// Flatten a typed MPIJob into Terraform state
pub fn flatten(job: &MPIJob) -> Value {
    let mut state = Map::new();
    state.insert("metadata".into(), flatten_metadata(&job.metadata));

    let mut spec = Map::new();
    if let Some(rp) = &job.spec.run_policy {
        spec.insert("run_policy".into(), flatten_run_policy(rp));
    }
    if let Some(slots) = job.spec.slots_per_worker {
        spec.insert("slots_per_worker".into(), Value::from(slots));
    }
    if let Some(policy) = &job.spec.clean_pod_policy {
        let s = match policy {
            CleanPodPolicy::All => "All",
            CleanPodPolicy::Running => "Running",
            CleanPodPolicy::None => "None",
        };
        spec.insert("clean_pod_policy".into(), Value::String(s.into()));
    }
    if !job.spec.mpi_replica_specs.is_empty() {
        spec.insert(
            "mpi_replica_specs".into(),
            flatten_replica_specs(&job.spec.mpi_replica_specs, &REPLICA_KEYS),
        );
    }
    state.insert("spec".into(), wrap_block(spec));

    if let Some(status) = &job.status {
        state.insert("status".into(), flatten_status(status));
    }
    Value::Object(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expand_maps_launcher_and_worker() {
        let state = json!({
            "metadata": [{"name": "horovod", "namespace": "training"}],
            "spec": [{
                "slots_per_worker": 2,
                "mpi_replica_specs": [{
                    "launcher": [{"replicas": 1}],
                    "worker": [{"replicas": 8}]
                }]
            }]
        });
        let job = expand(&state).unwrap();
        assert_eq!(job.spec.slots_per_worker, Some(2));
        assert_eq!(job.spec.mpi_replica_specs["Launcher"].replicas, Some(1));
        assert_eq!(job.spec.mpi_replica_specs["Worker"].replicas, Some(8));
    }

    #[test]
    fn flatten_then_expand_preserves_the_job() {
        let state = json!({
            "metadata": [{"name": "horovod"}],
            "spec": [{
                "clean_pod_policy": "All",
                "mpi_replica_specs": [{"worker": [{"replicas": 4}]}]
            }]
        });
        let job = expand(&state).unwrap();
        let job2 = expand(&flatten(&job)).unwrap();
        assert_eq!(job.spec, job2.spec);
    }
}
