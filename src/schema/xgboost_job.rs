//! Schema and expand/flatten for `kubeflow_xgboost_job`

use serde_json::{Map, Value};

use crate::api::{XGBoostJob, XGBoostJobSpec};
use crate::{Error, Result};

use super::common::{
    expand_replica_specs, expand_run_policy, expand_status, flatten_replica_specs,
    flatten_run_policy, flatten_status, replica_specs_block, run_policy_block, status_block,
};
use super::kubernetes::{expand_metadata, flatten_metadata, metadata_block};
use super::{first_block, wrap_block, Attribute, AttributeType, Block, NestedBlock, Nesting, Schema};

/// Lowercase block names paired with the operator's replica types
pub const REPLICA_KEYS: [(&str, &str); 2] = [("master", "Master"), ("worker", "Worker")];

/// Resource schema for `kubeflow_xgboost_job`
pub fn schema() -> Schema {
    Schema {
        version: 0,
        block: Block {
            description: "An XGBoost training job managed by the Kubeflow Training Operator.",
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
            description: "XGBoostJobSpec describes the desired state of the XGBoost training cluster.",
            attributes: vec![],
            blocks: vec![
                run_policy_block(),
                replica_specs_block("xgb_replica_specs", &["master", "worker"]),
            ],
        },
    }
}

/// Expand Terraform state into a typed XGBoostJob
pub fn expand(state: &Value) -> Result<XGBoostJob> {
    let metadata = expand_metadata(state);
    let name = metadata
        .name
        .clone()
        .ok_or_else(|| Error::validation("xgboost_job metadata requires a name"))?;

    let mut spec = XGBoostJobSpec::default();
    if let Some(spec_block) = first_block(state, "spec") {
        spec.run_policy = expand_run_policy(spec_block)?;
        spec.xgb_replica_specs =
            expand_replica_specs(spec_block, "xgb_replica_specs", &REPLICA_KEYS)?;
    }

    let mut job = XGBoostJob::new(&name, spec);
    job.metadata = metadata;
    job.status = expand_status(state)?;
    Ok(job)
}

/// Flatten a typed XGBoostJob into Terraform state
pub fn flatten(job: &XGBoostJob) -> Value {
    let mut state = Map::new();
    state.insert("metadata".into(), flatten_metadata(&job.metadata));

    let mut spec = Map::new();
    if let Some(rp) = &job.spec.run_policy {
        spec.insert("run_policy".into(), flatten_run_policy(rp));
    }
    if !job.spec.xgb_replica_specs.is_empty() {
        spec.insert(
            "xgb_replica_specs".into(),
            flatten_replica_specs(&job.spec.xgb_replica_specs, &REPLICA_KEYS),
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
    fn expand_and_flatten_round_trip() {
        let state = json!({
            "metadata": [{"name": "boost", "namespace": "training"}],
            "spec": [{
                "run_policy": [{"ttl_seconds_after_finished": 120}],
                "xgb_replica_specs": [{
                    "master": [{"replicas": 1}],
                    "worker": [{"replicas": 3}]
                }]
            }]
        });
        let job = expand(&state).unwrap();
        assert_eq!(job.spec.xgb_replica_specs["Worker"].replicas, Some(3));

        let job2 = expand(&flatten(&job)).unwrap();
        assert_eq!(job.spec, job2.spec);
    }
}
