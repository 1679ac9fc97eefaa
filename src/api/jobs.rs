//! Custom resource definitions for the five training job kinds
//!
//! Plurals and kinds match the CRDs the training operator installs, so the
//! dynamic client can address them without discovery.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::common::{CleanPodPolicy, ElasticPolicy, JobStatus, ReplicaSpec, RunPolicy};

/// Specification of a TensorFlow training job
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "TFJob",
    plural = "tfjobs",
    status = "JobStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct TFJobSpec {
    /// Runtime policies (cleanup, TTL, deadlines, backoff, scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Defines when the job is succeeded ("" = default, "AllWorkers")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_policy: Option<String>,

    /// Whether worker count can change at runtime
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dynamic_worker: Option<bool>,

    /// Replica groups keyed by type (Chief, PS, Worker, Evaluator)
    #[serde(rename = "tfReplicaSpecs", default)]
    pub tf_replica_specs: BTreeMap<String, ReplicaSpec>,
}

/// Specification of a PyTorch training job
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "PyTorchJob",
    plural = "pytorchjobs",
    status = "JobStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PyTorchJobSpec {
    /// Runtime policies (cleanup, TTL, deadlines, backoff, scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Elastic scaling configuration (torch-elastic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_policy: Option<ElasticPolicy>,

    /// Replica groups keyed by type (Master, Worker)
    #[serde(default)]
    pub pytorch_replica_specs: BTreeMap<String, ReplicaSpec>,
}

/// Specification of an MPI training job
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "MPIJob",
    plural = "mpijobs",
    status = "JobStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct MPIJobSpec {
    /// Runtime policies (cleanup, TTL, deadlines, backoff, scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Number of processor slots each worker hosts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots_per_worker: Option<i32>,

    /// Legacy pod cleanup policy predating runPolicy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<CleanPodPolicy>,

    /// Replica groups keyed by type (Launcher, Worker)
    #[serde(default)]
    pub mpi_replica_specs: BTreeMap<String, ReplicaSpec>,
}

/// Specification of an XGBoost training job
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "XGBoostJob",
    plural = "xgboostjobs",
    status = "JobStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct XGBoostJobSpec {
    /// Runtime policies (cleanup, TTL, deadlines, backoff, scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Replica groups keyed by type (Master, Worker)
    #[serde(rename = "xgbReplicaSpecs", default)]
    pub xgb_replica_specs: BTreeMap<String, ReplicaSpec>,
}

/// Specification of a PaddlePaddle training job
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "kubeflow.org",
    version = "v1",
    kind = "PaddleJob",
    plural = "paddlejobs",
    status = "JobStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct PaddleJobSpec {
    /// Runtime policies (cleanup, TTL, deadlines, backoff, scheduling)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_policy: Option<RunPolicy>,

    /// Elastic scaling configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_policy: Option<ElasticPolicy>,

    /// Replica groups keyed by type (Master, Worker)
    #[serde(default)]
    pub paddle_replica_specs: BTreeMap<String, ReplicaSpec>,
}
