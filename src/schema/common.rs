//! Blocks shared by every training job kind
//!
//! Run policy, scheduling policy, elastic policy, replica specs, and status
//! have identical shapes across the five kinds; only the replica-type keys
//! differ, which each kind passes in.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::api::{
    CleanPodPolicy, ElasticPolicy, JobCondition, JobConditionType, JobStatus, RdzvConf,
    ReplicaSpec, ReplicaStatus, RestartPolicy, RunPolicy, SchedulingPolicy,
};
use crate::{Error, Result};

use super::kubernetes::{expand_pod_template, flatten_pod_template, pod_template_block};
use super::{
    bool_field, first_block, i32_field, i64_field, list_field, str_field, string_map_field,
    wrap_block, Attribute, AttributeType, Block, NestedBlock, Nesting,
};

/// Run policy block, shared verbatim by all kinds
pub fn run_policy_block() -> NestedBlock {
    NestedBlock {
        name: "run_policy",
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "RunPolicy encapsulates various runtime policies of the distributed training job, for example how to clean up resources and how long the job can stay active.",
            attributes: vec![
                Attribute::optional("clean_pod_policy", AttributeType::String, "CleanPodPolicy defines the policy to kill pods after the job completes: All, Running or None."),
                Attribute::optional("ttl_seconds_after_finished", AttributeType::Number, "TTLSecondsAfterFinished is the TTL to clean up finished jobs."),
                Attribute::optional("active_deadline_seconds", AttributeType::Number, "Duration in seconds relative to the startTime that the job may be active before the system tries to terminate it."),
                Attribute::optional("backoff_limit", AttributeType::Number, "Optional number of retries before marking this job failed."),
            ],
            blocks: vec![NestedBlock {
                name: "scheduling_policy",
                nesting: Nesting::Single,
                required: false,
                block: Block {
                    description: "SchedulingPolicy encapsulates various scheduling policies of the distributed training job, for example `minAvailable` for gang-scheduling.",
                    attributes: vec![
                        Attribute::optional("min_available", AttributeType::Number, "MinAvailable is the minimum number of workers available for scheduling."),
                        Attribute::optional("queue", AttributeType::String, "Queue is the name of the queue to schedule the job to."),
                        Attribute::optional("min_resources", AttributeType::StringMap, "MinResources is the minimum resources required for scheduling."),
                        Attribute::optional("priority_class", AttributeType::String, "PriorityClass is the name of the priority class to schedule the job to."),
                        Attribute::optional("schedule_timeout_seconds", AttributeType::Number, "ScheduleTimeoutSeconds is the timeout for scheduling the job."),
                    ],
                    blocks: vec![],
                },
            }],
        },
    }
}

/// Expand the `run_policy` list of a spec block
pub fn expand_run_policy(spec: &Value) -> Result<Option<RunPolicy>> {
    let Some(block) = first_block(spec, "run_policy") else {
        return Ok(None);
    };

    let clean_pod_policy = match str_field(block, "clean_pod_policy") {
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

    Ok(Some(RunPolicy {
        clean_pod_policy,
        ttl_seconds_after_finished: i32_field(block, "ttl_seconds_after_finished"),
        active_deadline_seconds: i64_field(block, "active_deadline_seconds"),
        backoff_limit: i32_field(block, "backoff_limit"),
        scheduling_policy: expand_scheduling_policy(block),
    }))
}

fn expand_scheduling_policy(run_policy: &Value) -> Option<SchedulingPolicy> {
    let block = first_block(run_policy, "scheduling_policy")?;
    Some(SchedulingPolicy {
        min_available: i32_field(block, "min_available"),
        queue: str_field(block, "queue").map(str::to_string),
        min_resources: string_map_field(block, "min_resources"),
        priority_class: str_field(block, "priority_class").map(str::to_string),
        schedule_timeout_seconds: i32_field(block, "schedule_timeout_seconds"),
    })
}

/// Flatten a run policy into its block list
pub fn flatten_run_policy(rp: &RunPolicy) -> Value {
    let mut m = Map::new();
    if let Some(policy) = &rp.clean_pod_policy {
        let s = match policy {
            CleanPodPolicy::All => "All",
            CleanPodPolicy::Running => "Running",
            CleanPodPolicy::None => "None",
        };
        m.insert("clean_pod_policy".into(), Value::String(s.into()));
    }
    if let Some(ttl) = rp.ttl_seconds_after_finished {
        m.insert("ttl_seconds_after_finished".into(), Value::from(ttl));
    }
    if let Some(deadline) = rp.active_deadline_seconds {
        m.insert("active_deadline_seconds".into(), Value::from(deadline));
    }
    if let Some(limit) = rp.backoff_limit {
        m.insert("backoff_limit".into(), Value::from(limit));
    }
    if let Some(sp) = &rp.scheduling_policy {
        let mut s = Map::new();
        if let Some(min) = sp.min_available {
            s.insert("min_available".into(), Value::from(min));
        }
        if let Some(queue) = &sp.queue {
            s.insert("queue".into(), Value::String(queue.clone()));
        }
        if let Some(resources) = &sp.min_resources {
            s.insert(
                "min_resources".into(),
                Value::Object(
                    resources
                        .iter()
                        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                        .collect(),
                ),
            );
        }
        if let Some(class) = &sp.priority_class {
            s.insert("priority_class".into(), Value::String(class.clone()));
        }
        if let Some(timeout) = sp.schedule_timeout_seconds {
            s.insert("schedule_timeout_seconds".into(), Value::from(timeout));
        }
        m.insert("scheduling_policy".into(), wrap_block(s));
    }
    wrap_block(m)
}

/// Elastic policy block (PyTorch and Paddle jobs)
pub fn elastic_policy_block() -> NestedBlock {
    NestedBlock {
        name: "elastic_policy",
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "ElasticPolicy is a policy for elastic distributed training.",
            attributes: vec![
                Attribute::optional("min_replicas", AttributeType::Number, "Lower limit for the number of replicas the training job can scale down to."),
                Attribute::optional("max_replicas", AttributeType::Number, "Upper limit for the number of pods that can be set by the autoscaler; cannot be smaller than min_replicas."),
                Attribute::optional("rdzv_backend", AttributeType::String, "Rendezvous backend to use: c10d, etcd or etcd-v2."),
                Attribute::optional("rdzv_port", AttributeType::Number, "Port to use for rendezvous."),
                Attribute::optional("rdzv_host", AttributeType::String, "Host to use for rendezvous."),
                Attribute::optional("rdzv_id", AttributeType::String, "ID to use for rendezvous."),
                Attribute::optional("rdzv_conf", AttributeType::StringMap, "Additional rendezvous configuration (key = value)."),
                Attribute::optional("standalone", AttributeType::Bool, "Start a local standalone rendezvous backend. Useful when launching single-node, multi-worker jobs."),
                Attribute::optional("nproc_per_node", AttributeType::Number, "Number of workers per node."),
                Attribute::optional("max_restarts", AttributeType::Number, "Maximum number of times a single pod can be restarted."),
            ],
            blocks: vec![],
        },
    }
}

/// Expand the `elastic_policy` list of a spec block
pub fn expand_elastic_policy(spec: &Value) -> Result<Option<ElasticPolicy>> {
    let Some(block) = first_block(spec, "elastic_policy") else {
        return Ok(None);
    };

    let rdzv_backend = match str_field(block, "rdzv_backend") {
        None => None,
        Some(s) => Some(s.parse()?),
    };

    let rdzv_conf = string_map_field(block, "rdzv_conf").map(|m| {
        m.into_iter()
            .map(|(key, value)| RdzvConf { key, value })
            .collect()
    });

    Ok(Some(ElasticPolicy {
        min_replicas: i32_field(block, "min_replicas"),
        max_replicas: i32_field(block, "max_replicas"),
        rdzv_backend,
        rdzv_port: i32_field(block, "rdzv_port"),
        rdzv_host: str_field(block, "rdzv_host").map(str::to_string),
        rdzv_id: str_field(block, "rdzv_id").map(str::to_string),
        rdzv_conf,
        standalone: bool_field(block, "standalone"),
        n_proc_per_node: i32_field(block, "nproc_per_node"),
        max_restarts: i32_field(block, "max_restarts"),
    }))
}

/// Flatten an elastic policy into its block list
pub fn flatten_elastic_policy(ep: &ElasticPolicy) -> Value {
    let mut m = Map::new();
    if let Some(min) = ep.min_replicas {
        m.insert("min_replicas".into(), Value::from(min));
    }
    if let Some(max) = ep.max_replicas {
        m.insert("max_replicas".into(), Value::from(max));
    }
    if let Some(backend) = &ep.rdzv_backend {
        m.insert("rdzv_backend".into(), Value::String(backend.to_string()));
    }
    if let Some(port) = ep.rdzv_port {
        m.insert("rdzv_port".into(), Value::from(port));
    }
    if let Some(host) = &ep.rdzv_host {
        m.insert("rdzv_host".into(), Value::String(host.clone()));
    }
    if let Some(id) = &ep.rdzv_id {
        m.insert("rdzv_id".into(), Value::String(id.clone()));
    }
    if let Some(conf) = &ep.rdzv_conf {
        if !conf.is_empty() {
            m.insert(
                "rdzv_conf".into(),
                Value::Object(
                    conf.iter()
                        .map(|c| (c.key.clone(), Value::String(c.value.clone())))
                        .collect(),
                ),
            );
        }
    }
    if let Some(standalone) = ep.standalone {
        m.insert("standalone".into(), Value::Bool(standalone));
    }
    if let Some(nproc) = ep.n_proc_per_node {
        m.insert("nproc_per_node".into(), Value::from(nproc));
    }
    if let Some(max) = ep.max_restarts {
        m.insert("max_restarts".into(), Value::from(max));
    }
    wrap_block(m)
}

/// Block describing one replica group (replicas, restart policy, template)
pub fn replica_spec_block(name: &'static str) -> NestedBlock {
    NestedBlock {
        name,
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "ReplicaSpec describes one replica group of the training cluster.",
            attributes: vec![
                Attribute::optional("replicas", AttributeType::Number, "Desired number of replicas of this type. Defaults to 1."),
                Attribute::optional("restart_policy", AttributeType::String, "Restart policy for all replicas of this type: Always, OnFailure, Never or ExitCode. Defaults to Never."),
            ],
            blocks: vec![pod_template_block()],
        },
    }
}

/// Block mapping lowercase replica keys to replica spec blocks
pub fn replica_specs_block(name: &'static str, keys: &'static [&'static str]) -> NestedBlock {
    NestedBlock {
        name,
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "Map of replica type to replica spec, specifying the training cluster configuration.",
            attributes: vec![],
            blocks: keys.iter().map(|key| replica_spec_block(key)).collect(),
        },
    }
}

/// Expand one replica spec list (the value of a `worker`/`master`/… block)
pub fn expand_replica_spec(state: &Value, key: &str) -> Result<Option<ReplicaSpec>> {
    let Some(block) = first_block(state, key) else {
        return Ok(None);
    };

    let restart_policy = match str_field(block, "restart_policy") {
        None => None,
        Some("Always") => Some(RestartPolicy::Always),
        Some("OnFailure") => Some(RestartPolicy::OnFailure),
        Some("Never") => Some(RestartPolicy::Never),
        Some("ExitCode") => Some(RestartPolicy::ExitCode),
        Some(other) => {
            return Err(Error::validation(format!(
                "invalid restart_policy {other:?}, expected one of: Always, OnFailure, Never, ExitCode"
            )))
        }
    };

    let template = if first_block(block, "template").is_some() {
        Some(expand_pod_template(block))
    } else {
        None
    };

    Ok(Some(ReplicaSpec {
        replicas: i32_field(block, "replicas").or(Some(1)),
        restart_policy: restart_policy.or(Some(RestartPolicy::Never)),
        template,
    }))
}

/// Expand a whole replica-specs block into the canonical-keyed map.
///
/// `keys` pairs the Terraform-side lowercase block name with the canonical
/// replica type the operator expects (e.g. `("ps", "PS")`). Keys absent
/// from the pairing are simply not part of the schema and cannot occur.
pub fn expand_replica_specs(
    spec: &Value,
    block_name: &str,
    keys: &[(&str, &str)],
) -> Result<BTreeMap<String, ReplicaSpec>> {
    let mut out = BTreeMap::new();
    let Some(block) = first_block(spec, block_name) else {
        return Ok(out);
    };

    for (lower, canonical) in keys {
        if let Some(replica) = expand_replica_spec(block, lower)? {
            out.insert(canonical.to_string(), replica);
        }
    }
    Ok(out)
}

/// Flatten a replica map back into its Terraform block
pub fn flatten_replica_specs(
    replicas: &BTreeMap<String, ReplicaSpec>,
    keys: &[(&str, &str)],
) -> Value {
    let mut m = Map::new();
    for (lower, canonical) in keys {
        if let Some(replica) = replicas.get(*canonical) {
            m.insert((*lower).to_string(), flatten_replica_spec(replica));
        }
    }
    wrap_block(m)
}

fn flatten_replica_spec(replica: &ReplicaSpec) -> Value {
    let mut m = Map::new();
    if let Some(replicas) = replica.replicas {
        m.insert("replicas".into(), Value::from(replicas));
    }
    if let Some(policy) = &replica.restart_policy {
        let s = match policy {
            RestartPolicy::Always => "Always",
            RestartPolicy::OnFailure => "OnFailure",
            RestartPolicy::Never => "Never",
            RestartPolicy::ExitCode => "ExitCode",
        };
        m.insert("restart_policy".into(), Value::String(s.into()));
    }
    if let Some(template) = &replica.template {
        m.insert("template".into(), flatten_pod_template(template));
    }
    wrap_block(m)
}

/// Status block shared by all kinds (computed only)
pub fn status_block() -> NestedBlock {
    NestedBlock {
        name: "status",
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "Most recently observed status of the training job, as reported by the operator.",
            attributes: vec![
                Attribute::computed("start_time", AttributeType::String, "Time the operator started processing the job (RFC 3339)."),
                Attribute::computed("completion_time", AttributeType::String, "Time the job completed (RFC 3339)."),
            ],
            blocks: vec![
                NestedBlock {
                    name: "conditions",
                    nesting: Nesting::List,
                    required: false,
                    block: Block {
                        description: "Conditions describing the job's observed state.",
                        attributes: vec![
                            Attribute::computed("type", AttributeType::String, "Condition type: Created, Running, Restarting, Succeeded or Failed."),
                            Attribute::computed("status", AttributeType::String, "Condition status: True, False or Unknown."),
                            Attribute::computed("reason", AttributeType::String, "Machine-readable reason for the condition."),
                            Attribute::computed("message", AttributeType::String, "Human-readable condition message."),
                        ],
                        blocks: vec![],
                    },
                },
                NestedBlock {
                    name: "replica_statuses",
                    nesting: Nesting::List,
                    required: false,
                    block: Block {
                        description: "Per-replica-type pod counts.",
                        attributes: vec![
                            Attribute::computed("replica_type", AttributeType::String, "The replica type these counts describe."),
                            Attribute::computed("active", AttributeType::Number, "The number of actively running pods."),
                            Attribute::computed("succeeded", AttributeType::Number, "The number of pods which reached phase Succeeded."),
                            Attribute::computed("failed", AttributeType::Number, "The number of pods which reached phase Failed."),
                            Attribute::computed("selector", AttributeType::String, "Label query over the pods of this replica type."),
                        ],
                        blocks: vec![],
                    },
                },
            ],
        },
    }
}

/// Expand a status list; used on import so stored state survives a replan
pub fn expand_status(state: &Value) -> Result<Option<JobStatus>> {
    let Some(block) = first_block(state, "status") else {
        return Ok(None);
    };

    let mut status = JobStatus::default();
    if let Some(conditions) = list_field(block, "conditions") {
        for c in conditions {
            let type_ = match str_field(c, "type") {
                Some("Created") => JobConditionType::Created,
                Some("Running") => JobConditionType::Running,
                Some("Restarting") => JobConditionType::Restarting,
                Some("Succeeded") => JobConditionType::Succeeded,
                Some("Failed") => JobConditionType::Failed,
                other => {
                    return Err(Error::validation(format!(
                        "invalid condition type {other:?}"
                    )))
                }
            };
            let mut condition =
                JobCondition::new(type_, str_field(c, "status").unwrap_or("Unknown"));
            condition.reason = str_field(c, "reason").map(str::to_string);
            condition.message = str_field(c, "message").map(str::to_string);
            status.conditions.push(condition);
        }
    }
    if let Some(statuses) = list_field(block, "replica_statuses") {
        for rs in statuses {
            let Some(replica_type) = str_field(rs, "replica_type") else {
                continue;
            };
            status.replica_statuses.insert(
                replica_type.to_string(),
                ReplicaStatus {
                    active: i32_field(rs, "active"),
                    succeeded: i32_field(rs, "succeeded"),
                    failed: i32_field(rs, "failed"),
                    selector: str_field(rs, "selector").map(str::to_string),
                },
            );
        }
    }
    Ok(Some(status))
}

/// Flatten a job status into its block list
pub fn flatten_status(status: &JobStatus) -> Value {
    let mut m = Map::new();

    if !status.conditions.is_empty() {
        let conditions: Vec<Value> = status
            .conditions
            .iter()
            .map(|c| {
                let mut v = Map::new();
                let type_ = match c.type_ {
                    JobConditionType::Created => "Created",
                    JobConditionType::Running => "Running",
                    JobConditionType::Restarting => "Restarting",
                    JobConditionType::Succeeded => "Succeeded",
                    JobConditionType::Failed => "Failed",
                };
                v.insert("type".into(), Value::String(type_.into()));
                v.insert("status".into(), Value::String(c.status.clone()));
                if let Some(reason) = &c.reason {
                    v.insert("reason".into(), Value::String(reason.clone()));
                }
                if let Some(message) = &c.message {
                    v.insert("message".into(), Value::String(message.clone()));
                }
                Value::Object(v)
            })
            .collect();
        m.insert("conditions".into(), Value::Array(conditions));
    }

    if !status.replica_statuses.is_empty() {
        let statuses: Vec<Value> = status
            .replica_statuses
            .iter()
            .map(|(replica_type, rs)| {
                let mut v = Map::new();
                v.insert("replica_type".into(), Value::String(replica_type.clone()));
                if let Some(active) = rs.active {
                    v.insert("active".into(), Value::from(active));
                }
                if let Some(succeeded) = rs.succeeded {
                    v.insert("succeeded".into(), Value::from(succeeded));
                }
                if let Some(failed) = rs.failed {
                    v.insert("failed".into(), Value::from(failed));
                }
                if let Some(selector) = &rs.selector {
                    v.insert("selector".into(), Value::String(selector.clone()));
                }
                Value::Object(v)
            })
            .collect();
        m.insert("replica_statuses".into(), Value::Array(statuses));
    }

    if let Some(start) = &status.start_time {
        m.insert(
            "start_time".into(),
            Value::String(start.0.to_rfc3339_opts(k8s_openapi::chrono::SecondsFormat::Secs, true)),
        );
    }
    if let Some(completion) = &status.completion_time {
        m.insert(
            "completion_time".into(),
            Value::String(
                completion
                    .0
                    .to_rfc3339_opts(k8s_openapi::chrono::SecondsFormat::Secs, true),
            ),
        );
    }
    wrap_block(m)
}
