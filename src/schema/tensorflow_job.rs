//! Schema and expand/flatten for `kubeflow_tf_job`

use serde_json::{Map, Value};

use crate::api::{TFJob, TFJobSpec};
use crate::{Error, Result};

use super::common::{
    expand_replica_specs, expand_run_policy, expand_status, flatten_replica_specs,
    flatten_run_policy, flatten_status, replica_specs_block, run_policy_block, status_block,
};
use super::kubernetes::{expand_metadata, flatten_metadata, metadata_block};
use super::{
    bool_field, first_block, str_field, wrap_block, Attribute, AttributeType, Block, NestedBlock,
    Nesting, Schema,
};

/// Lowercase block names paired with the operator's replica types
pub const REPLICA_KEYS: [(&str, &str); 4] = [
    ("chief", "Chief"),
    ("ps", "PS"),
    ("worker", "Worker"),
    ("evaluator", "Evaluator"),
];

/// Resource schema for `kubeflow_tf_job`
pub fn schema() -> Schema {
    Schema {
        version: 0,
        block: Block {
            description: "A TensorFlow training job managed by the Kubeflow Training Operator.",
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
            description: "TFJobSpec describes the desired state of the TensorFlow training cluster.",
            attributes: vec![
                Attribute::optional(
                    "success_policy",
                    AttributeType::String,
                    "Defines when the job is succeeded: empty (distributed by chief) or AllWorkers.",
                ),
                Attribute::optional(
                    "enable_dynamic_worker",
                    AttributeType::Bool,
                    "Whether worker count can change at runtime.",
                ),
            ],
            blocks: vec![
                run_policy_block(),
                replica_specs_block(
                    "tf_replica_specs",
                    &["chief", "ps", "worker", "evaluator"],
                ),
            ],
        },
    }
}

/// Expand Terraform state into a typed TFJob
pub fn expand(state: &Value) -> Result<TFJob> {
    let metadata = expand_metadata(state);
    let name = metadata
        .name
        .clone()
        .ok_or_else(|| Error::validation("tf_job metadata requires a name"))?;

    let mut spec = TFJobSpec::default();
    if let Some(spec_block) = first_block(state, "spec") {
        spec.run_policy = expand_run_policy(spec_block)?;
        spec.success_policy = match str_field(spec_block, "success_policy") {
            None => None,
            Some(s @ "AllWorkers") => Some(s.to_string()),
            Some(other) => {
                return Err(Error::validation(format!(
                    "invalid success_policy {other:?}, expected AllWorkers or empty"
                )))
            }
        };
        spec.enable_dynamic_worker = bool_field(spec_block, "enable_dynamic_worker");
        spec.tf_replica_specs =
            expand_replica_specs(spec_block, "tf_replica_specs", &REPLICA_KEYS)?;
    }

    let mut job = TFJob::new(&name, spec);
    job.metadata = metadata;
    job.status = expand_status(state)?;
    Ok(job)
}

/// Flatten a typed TFJob into Terraform state
pub fn flatten(job: &TFJob) -> Value {
    let mut state = Map::new();
    state.insert("metadata".into(), flatten_metadata(&job.metadata));

    let mut spec = Map::new();
    if let Some(rp) = &job.spec.run_policy {
        spec.insert("run_policy".into(), flatten_run_policy(rp));
    }
    if let Some(policy) = &job.spec.success_policy {
        spec.insert("success_policy".into(), Value::String(policy.clone()));
    }
    if let Some(dynamic) = job.spec.enable_dynamic_worker {
        spec.insert("enable_dynamic_worker".into(), Value::Bool(dynamic));
    }
    if !job.spec.tf_replica_specs.is_empty() {
        spec.insert(
            "tf_replica_specs".into(),
            flatten_replica_specs(&job.spec.tf_replica_specs, &REPLICA_KEYS),
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

    fn sample_state() -> Value {
        json!({
            "metadata": [{"name": "mnist", "namespace": "training"}],
            "spec": [{
                "success_policy": "AllWorkers",
                "run_policy": [{"clean_pod_policy": "Running"}],
                "tf_replica_specs": [{
                    "chief": [{"replicas": 1}],
                    "ps": [{"replicas": 2}],
                    "worker": [{"replicas": 4, "restart_policy": "OnFailure"}]
                }]
            }]
        })
    }

    #[test]
    fn expand_builds_the_operator_object() {
        let job = expand(&sample_state()).unwrap();
        assert_eq!(job.metadata.name.as_deref(), Some("mnist"));
        assert_eq!(job.metadata.namespace.as_deref(), Some("training"));
        assert_eq!(job.spec.success_policy.as_deref(), Some("AllWorkers"));
        assert_eq!(job.spec.tf_replica_specs.len(), 3);
        assert_eq!(job.spec.tf_replica_specs["PS"].replicas, Some(2));
        assert!(!job.spec.tf_replica_specs.contains_key("Evaluator"));
    }

    #[test]
    fn expand_requires_a_name() {
        let state = json!({"metadata": [{"namespace": "training"}]});
        assert!(expand(&state).is_err());
    }

    #[test]
    fn invalid_success_policy_is_rejected() {
        let state = json!({
            "metadata": [{"name": "mnist"}],
            "spec": [{"success_policy": "SomeWorkers"}]
        });
        assert!(expand(&state).is_err());
    }

    #[test]
    fn flatten_then_expand_preserves_the_job() {
        let job = expand(&sample_state()).unwrap();
        let job2 = expand(&flatten(&job)).unwrap();
        assert_eq!(job.spec, job2.spec);
        assert_eq!(job.metadata.name, job2.metadata.name);
    }
}
