//! Schema and expand/flatten for `kubeflow_pytorch_job`

use serde_json::{Map, Value};

use crate::api::{PyTorchJob, PyTorchJobSpec};
use crate::{Error, Result};

use super::common::{
    elastic_policy_block, expand_elastic_policy, expand_replica_specs, expand_run_policy,
    expand_status, flatten_elastic_policy, flatten_replica_specs, flatten_run_policy,
    flatten_status, replica_specs_block, run_policy_block, status_block,
};
use super::kubernetes::{expand_metadata, flatten_metadata, metadata_block};
use super::{first_block, wrap_block, Attribute, AttributeType, Block, NestedBlock, Nesting, Schema};

/// Lowercase block names paired with the operator's replica types
pub const REPLICA_KEYS: [(&str, &str); 2] = [("master", "Master"), ("worker", "Worker")];

/// Resource schema for `kubeflow_pytorch_job`
pub fn schema() -> Schema {
    Schema {
        version: 0,
        block: Block {
            description: "A PyTorch training job managed by the Kubeflow Training Operator.",
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
            description: "PyTorchJobSpec describes the desired state of the PyTorch training cluster.",
            attributes: vec![],
            blocks: vec![
                run_policy_block(),
                elastic_policy_block(),
                replica_specs_block("pytorch_replica_specs", &["master", "worker"]),
            ],
        },
    }
}

/// Expand Terraform state into a typed PyTorchJob
pub fn expand(state: &Value) -> Result<PyTorchJob> {
    let metadata = expand_metadata(state);
    let name = metadata
        .name
        .clone()
        .ok_or_else(|| Error::validation("pytorch_job metadata requires a name"))?;

    let mut spec = PyTorchJobSpec::default();
    if let Some(spec_block) = first_block(state, "spec") {
        spec.run_policy = expand_run_policy(spec_block)?;
        spec.elastic_policy = expand_elastic_policy(spec_block)?;
        spec.pytorch_replica_specs =
            expand_replica_specs(spec_block, "pytorch_replica_specs", &REPLICA_KEYS)?;
    }

    let mut job = PyTorchJob::new(&name, spec);
    job.metadata = metadata;
    job.status = expand_status(state)?;
    Ok(job)
}

/// Flatten a typed PyTorchJob into Terraform state
pub fn flatten(job: &PyTorchJob) -> Value {
    let mut state = Map::new();
    state.insert("metadata".into(), flatten_metadata(&job.metadata));

    let mut spec = Map::new();
    if let Some(rp) = &job.spec.run_policy {
        spec.insert("run_policy".into(), flatten_run_policy(rp));
    }
    if let Some(ep) = &job.spec.elastic_policy {
        spec.insert("elastic_policy".into(), flatten_elastic_policy(ep));
    }
    if !job.spec.pytorch_replica_specs.is_empty() {
        spec.insert(
            "pytorch_replica_specs".into(),
            flatten_replica_specs(&job.spec.pytorch_replica_specs, &REPLICA_KEYS),
        );
    }
    state.insert("spec".into(), wrap_block(spec));

    if let Some(status) = &job.status {
        state.insert("status".into(), flatten_status(status));
    }
    Value::Object(state)
}
