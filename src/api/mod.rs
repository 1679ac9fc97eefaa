//! Typed Kubeflow Training Operator API objects
//!
//! These are pass-through representations of the `kubeflow.org/v1` CRDs as
//! published by the training operator. Their shapes are owned upstream; this
//! module only mirrors them closely enough for expand/flatten and CRUD.

mod common;
mod jobs;

pub use common::{
    CleanPodPolicy, ElasticPolicy, JobCondition, JobConditionType, JobStatus, RdzvBackend,
    RdzvConf, ReplicaSpec, ReplicaStatus, RestartPolicy, RunPolicy, SchedulingPolicy,
};
pub use jobs::{
    MPIJob, MPIJobSpec, PaddleJob, PaddleJobSpec, PyTorchJob, PyTorchJobSpec, TFJob, TFJobSpec,
    XGBoostJob, XGBoostJobSpec,
};
