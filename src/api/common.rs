//! Types shared by all five training job kinds
//!
//! Mirrors the training operator's common types: replica specs, run policy,
//! elastic policy, and job status. Field names serialize exactly as the
//! operator's CRDs expect (camelCase, upstream abbreviations kept).

use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Restart policy for replicas of a training job
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Always restart the replica when it exits
    Always,
    /// Restart the replica on failure
    OnFailure,
    /// Never restart the replica
    #[default]
    Never,
    /// Restart on exit codes the operator deems retryable
    ExitCode,
}

/// Describes one replica group of a training job (e.g. workers)
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSpec {
    /// Desired number of replicas of this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Pod template describing the pods that will be created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,

    /// Restart policy for all replicas of this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
}

/// Policy for cleaning up pods after the job completes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CleanPodPolicy {
    /// Delete all pods when the job finishes
    All,
    /// Delete only still-running pods when the job finishes
    #[default]
    Running,
    /// Keep all pods
    None,
}

/// Gang-scheduling knobs passed through to the scheduler
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingPolicy {
    /// Minimum number of pods that must be available for scheduling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_available: Option<i32>,

    /// Name of the queue to schedule the job into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,

    /// Minimum resources required for scheduling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_resources: Option<BTreeMap<String, String>>,

    /// Priority class name for the job's pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class: Option<String>,

    /// Timeout for scheduling the whole gang
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_timeout_seconds: Option<i32>,
}

/// Runtime policies shared by all training job kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunPolicy {
    /// Policy for cleaning up pods after the job completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean_pod_policy: Option<CleanPodPolicy>,

    /// TTL for cleaning up finished jobs (seconds)
    #[serde(
        rename = "ttlSecondsAfterFinished",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ttl_seconds_after_finished: Option<i32>,

    /// Duration the job may stay active past its start time (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_deadline_seconds: Option<i64>,

    /// Number of retries before marking the job failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<i32>,

    /// Gang-scheduling configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_policy: Option<SchedulingPolicy>,
}

/// Rendezvous backend for elastic training
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RdzvBackend {
    /// C10d TCP store rendezvous
    C10d,
    /// etcd rendezvous
    Etcd,
    /// etcd v2 API rendezvous
    EtcdV2,
}

impl std::str::FromStr for RdzvBackend {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c10d" => Ok(Self::C10d),
            "etcd" => Ok(Self::Etcd),
            "etcd-v2" => Ok(Self::EtcdV2),
            other => Err(crate::Error::validation(format!(
                "invalid rdzv_backend {other:?}, expected one of: c10d, etcd, etcd-v2"
            ))),
        }
    }
}

impl std::fmt::Display for RdzvBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::C10d => write!(f, "c10d"),
            Self::Etcd => write!(f, "etcd"),
            Self::EtcdV2 => write!(f, "etcd-v2"),
        }
    }
}

/// One key/value pair of additional rendezvous configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RdzvConf {
    /// Configuration key
    #[serde(default)]
    pub key: String,
    /// Configuration value
    #[serde(default)]
    pub value: String,
}

/// Elastic scaling policy for torch-elastic style training
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ElasticPolicy {
    /// Lower replica bound the job can scale down to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    /// Upper replica bound the autoscaler may set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,

    /// Rendezvous backend to use
    #[serde(
        rename = "rdzvBackend",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rdzv_backend: Option<RdzvBackend>,

    /// Rendezvous port
    #[serde(rename = "rdzvPort", default, skip_serializing_if = "Option::is_none")]
    pub rdzv_port: Option<i32>,

    /// Rendezvous host
    #[serde(rename = "rdzvHost", default, skip_serializing_if = "Option::is_none")]
    pub rdzv_host: Option<String>,

    /// Rendezvous ID
    #[serde(rename = "rdzvId", default, skip_serializing_if = "Option::is_none")]
    pub rdzv_id: Option<String>,

    /// Additional rendezvous configuration pairs
    #[serde(
        rename = "rdzvConf",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rdzv_conf: Option<Vec<RdzvConf>>,

    /// Run a local standalone rendezvous backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone: Option<bool>,

    /// Number of workers per node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_proc_per_node: Option<i32>,

    /// Maximum number of restarts for a single pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_restarts: Option<i32>,
}

/// Condition types reported by the training operator
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum JobConditionType {
    /// Job resources have been created
    Created,
    /// Job is running
    Running,
    /// Job is restarting failed replicas
    Restarting,
    /// Job completed successfully
    Succeeded,
    /// Job failed terminally
    Failed,
}

/// One entry of a job's condition list
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobCondition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: JobConditionType,

    /// Condition status: "True", "False" or "Unknown"
    pub status: String,

    /// Machine-readable reason for the condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable condition message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition was updated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Time>,

    /// Last time the condition transitioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
}

impl JobCondition {
    /// Shorthand for a condition with the given type and status
    pub fn new(type_: JobConditionType, status: impl Into<String>) -> Self {
        Self {
            type_,
            status: status.into(),
            reason: None,
            message: None,
            last_update_time: None,
            last_transition_time: None,
        }
    }
}

/// Counts of pods per phase for one replica type
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaStatus {
    /// Number of actively running pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<i32>,

    /// Number of pods that reached phase Succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<i32>,

    /// Number of pods that reached phase Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<i32>,

    /// Label selector over the pods of this replica type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

/// Status shared by all five training job kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Conditions describing the job's observed state
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<JobCondition>,

    /// Per-replica-type pod counts
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replica_statuses: BTreeMap<String, ReplicaStatus>,

    /// Time the operator started processing the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Time>,

    /// Time the job completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<Time>,

    /// Time of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconcile_time: Option<Time>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_policy_serializes_with_upstream_field_names() {
        let rp = RunPolicy {
            clean_pod_policy: Some(CleanPodPolicy::Running),
            ttl_seconds_after_finished: Some(600),
            active_deadline_seconds: Some(3600),
            backoff_limit: Some(3),
            scheduling_policy: None,
        };
        let v = serde_json::to_value(&rp).unwrap();
        assert_eq!(v["cleanPodPolicy"], "Running");
        assert_eq!(v["ttlSecondsAfterFinished"], 600);
        assert_eq!(v["activeDeadlineSeconds"], 3600);
        assert_eq!(v["backoffLimit"], 3);
    }

    #[test]
    fn elastic_policy_keeps_the_rdzv_abbreviation() {
        let ep = ElasticPolicy {
            rdzv_backend: Some(RdzvBackend::C10d),
            rdzv_port: Some(29400),
            ..Default::default()
        };
        let v = serde_json::to_value(&ep).unwrap();
        assert_eq!(v["rdzvBackend"], "c10d");
        assert_eq!(v["rdzvPort"], 29400);
    }

    #[test]
    fn rdzv_backend_parsing_rejects_unknown_backends() {
        assert_eq!("etcd-v2".parse::<RdzvBackend>().unwrap(), RdzvBackend::EtcdV2);
        assert!("zookeeper".parse::<RdzvBackend>().is_err());
    }

    #[test]
    fn job_status_defaults_are_empty() {
        let status = JobStatus::default();
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v, serde_json::json!({}));
    }
}
