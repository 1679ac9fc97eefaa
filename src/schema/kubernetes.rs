//! Shared Kubernetes blocks: object metadata and pod templates
//!
//! The pod template block covers the subset of the pod spec the provider
//! schema declares (containers, env, resources, volumes, node selection).
//! Fields outside that subset are not expressible in configuration.

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, LocalObjectReference,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, ResourceRequirements,
    SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Map, Value};

use super::{
    bool_field, first_block, list_field, str_field, string_list_field, string_map_field,
    wrap_block, Attribute, AttributeType, Block, NestedBlock, Nesting,
};

/// Metadata block for a namespaced object
pub fn metadata_block() -> NestedBlock {
    NestedBlock {
        name: "metadata",
        nesting: Nesting::Single,
        required: true,
        block: Block {
            description: "Standard object metadata.",
            attributes: vec![
                Attribute::required("name", AttributeType::String, "Name of the object, unique within its namespace."),
                Attribute::optional("namespace", AttributeType::String, "Namespace the object belongs to. Defaults to `default`."),
                Attribute::optional("labels", AttributeType::StringMap, "Map of string keys and values that can be used to organize and categorize objects."),
                Attribute::optional("annotations", AttributeType::StringMap, "An unstructured key value map stored with the object."),
                Attribute::computed("generation", AttributeType::Number, "A sequence number representing a specific generation of the desired state."),
                Attribute::computed("resource_version", AttributeType::String, "An opaque value that represents the internal version of the object."),
                Attribute::computed("uid", AttributeType::String, "The unique in-time-and-space value for the object."),
            ],
            blocks: vec![],
        },
    }
}

/// Expand a metadata list into `ObjectMeta`
pub fn expand_metadata(state: &Value) -> ObjectMeta {
    let mut meta = ObjectMeta::default();
    let Some(block) = first_block(state, "metadata") else {
        return meta;
    };

    meta.name = str_field(block, "name").map(str::to_string);
    meta.namespace = Some(
        str_field(block, "namespace")
            .unwrap_or("default")
            .to_string(),
    );
    meta.labels = string_map_field(block, "labels");
    meta.annotations = string_map_field(block, "annotations");
    meta
}

/// Flatten `ObjectMeta` into a metadata list
pub fn flatten_metadata(meta: &ObjectMeta) -> Value {
    let mut m = Map::new();
    if let Some(name) = &meta.name {
        m.insert("name".into(), Value::String(name.clone()));
    }
    if let Some(namespace) = &meta.namespace {
        m.insert("namespace".into(), Value::String(namespace.clone()));
    }
    if let Some(labels) = &meta.labels {
        if !labels.is_empty() {
            m.insert("labels".into(), string_map_value(labels));
        }
    }
    if let Some(annotations) = &meta.annotations {
        if !annotations.is_empty() {
            m.insert("annotations".into(), string_map_value(annotations));
        }
    }
    if let Some(generation) = meta.generation {
        m.insert("generation".into(), Value::from(generation));
    }
    if let Some(rv) = &meta.resource_version {
        m.insert("resource_version".into(), Value::String(rv.clone()));
    }
    if let Some(uid) = &meta.uid {
        m.insert("uid".into(), Value::String(uid.clone()));
    }
    wrap_block(m)
}

fn string_map_value(map: &std::collections::BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Pod template block used inside every replica spec
pub fn pod_template_block() -> NestedBlock {
    NestedBlock {
        name: "template",
        nesting: Nesting::Single,
        required: false,
        block: Block {
            description: "Pod template describing the pods that will be created.",
            attributes: vec![],
            blocks: vec![
                metadata_block_optional(),
                NestedBlock {
                    name: "spec",
                    nesting: Nesting::Single,
                    required: false,
                    block: pod_spec_block(),
                },
            ],
        },
    }
}

fn metadata_block_optional() -> NestedBlock {
    let mut block = metadata_block();
    block.required = false;
    // Pod template metadata has no name of its own.
    block.block.attributes.retain(|a| a.name != "name" && a.name != "namespace");
    block
}

fn pod_spec_block() -> Block {
    Block {
        description: "Specification of the desired behavior of the pods.",
        attributes: vec![
            Attribute::optional("node_selector", AttributeType::StringMap, "NodeSelector must match a node's labels for the pod to be scheduled on that node."),
            Attribute::optional("service_account_name", AttributeType::String, "Name of the ServiceAccount to use to run the pods."),
            Attribute::optional("image_pull_secrets", AttributeType::StringList, "Names of secrets in the same namespace to use for pulling images."),
        ],
        blocks: vec![
            NestedBlock {
                name: "container",
                nesting: Nesting::List,
                required: false,
                block: container_block(),
            },
            NestedBlock {
                name: "volume",
                nesting: Nesting::List,
                required: false,
                block: volume_block(),
            },
        ],
    }
}

fn container_block() -> Block {
    Block {
        description: "A single application container to run within a pod.",
        attributes: vec![
            Attribute::required("name", AttributeType::String, "Name of the container, unique within the pod."),
            Attribute::optional("image", AttributeType::String, "Container image name."),
            Attribute::optional("command", AttributeType::StringList, "Entrypoint array. Not executed within a shell."),
            Attribute::optional("args", AttributeType::StringList, "Arguments to the entrypoint."),
            Attribute::optional("working_dir", AttributeType::String, "Container's working directory."),
            Attribute::optional("image_pull_policy", AttributeType::String, "Image pull policy: Always, Never or IfNotPresent."),
        ],
        blocks: vec![
            NestedBlock {
                name: "env",
                nesting: Nesting::List,
                required: false,
                block: Block {
                    description: "Environment variables to set in the container.",
                    attributes: vec![
                        Attribute::required("name", AttributeType::String, "Name of the environment variable."),
                        Attribute::optional("value", AttributeType::String, "Value of the environment variable."),
                    ],
                    blocks: vec![],
                },
            },
            NestedBlock {
                name: "resources",
                nesting: Nesting::Single,
                required: false,
                block: Block {
                    description: "Compute resources required by this container.",
                    attributes: vec![
                        Attribute::optional("limits", AttributeType::StringMap, "Maximum amount of compute resources allowed."),
                        Attribute::optional("requests", AttributeType::StringMap, "Minimum amount of compute resources required."),
                    ],
                    blocks: vec![],
                },
            },
            NestedBlock {
                name: "volume_mount",
                nesting: Nesting::List,
                required: false,
                block: Block {
                    description: "Pod volumes to mount into the container's filesystem.",
                    attributes: vec![
                        Attribute::required("name", AttributeType::String, "Name of the volume to mount."),
                        Attribute::required("mount_path", AttributeType::String, "Path within the container at which the volume should be mounted."),
                        Attribute::optional("sub_path", AttributeType::String, "Path within the volume from which the container's volume should be mounted."),
                        Attribute::optional("read_only", AttributeType::Bool, "Mount read-only if true."),
                    ],
                    blocks: vec![],
                },
            },
        ],
    }
}

fn volume_block() -> Block {
    Block {
        description: "A named volume that may be accessed by any container in the pod.",
        attributes: vec![
            Attribute::required("name", AttributeType::String, "Volume name, unique within the pod."),
            Attribute::optional("config_map", AttributeType::String, "Name of a ConfigMap to populate this volume."),
            Attribute::optional("secret", AttributeType::String, "Name of a Secret to populate this volume."),
            Attribute::optional("persistent_volume_claim", AttributeType::String, "Name of a PersistentVolumeClaim in the same namespace backing this volume."),
            Attribute::optional("empty_dir", AttributeType::Bool, "Back this volume with a temporary directory that shares a pod's lifetime."),
        ],
        blocks: vec![],
    }
}

/// Expand a pod template list into `PodTemplateSpec`
pub fn expand_pod_template(state: &Value) -> PodTemplateSpec {
    let mut template = PodTemplateSpec::default();
    let Some(block) = first_block(state, "template") else {
        return template;
    };

    if first_block(block, "metadata").is_some() {
        let meta = expand_metadata(block);
        if meta.labels.is_some() || meta.annotations.is_some() {
            template.metadata = Some(ObjectMeta {
                labels: meta.labels,
                annotations: meta.annotations,
                ..ObjectMeta::default()
            });
        }
    }

    if let Some(spec) = first_block(block, "spec") {
        template.spec = Some(expand_pod_spec(spec));
    }
    template
}

fn expand_pod_spec(block: &Value) -> PodSpec {
    let mut spec = PodSpec::default();

    spec.node_selector = string_map_field(block, "node_selector");
    spec.service_account_name = str_field(block, "service_account_name").map(str::to_string);
    spec.image_pull_secrets = string_list_field(block, "image_pull_secrets").map(|names| {
        names
            .into_iter()
            .map(|name| LocalObjectReference { name })
            .collect()
    });

    if let Some(containers) = list_field(block, "container") {
        spec.containers = containers.iter().map(expand_container).collect();
    }
    if let Some(volumes) = list_field(block, "volume") {
        spec.volumes = Some(volumes.iter().map(expand_volume).collect());
    }
    spec
}

fn expand_container(block: &Value) -> Container {
    let mut container = Container {
        name: str_field(block, "name").unwrap_or_default().to_string(),
        image: str_field(block, "image").map(str::to_string),
        command: string_list_field(block, "command"),
        args: string_list_field(block, "args"),
        working_dir: str_field(block, "working_dir").map(str::to_string),
        image_pull_policy: str_field(block, "image_pull_policy").map(str::to_string),
        ..Container::default()
    };

    if let Some(env) = list_field(block, "env") {
        container.env = Some(
            env.iter()
                .map(|e| EnvVar {
                    name: str_field(e, "name").unwrap_or_default().to_string(),
                    value: str_field(e, "value").map(str::to_string),
                    value_from: None,
                })
                .collect(),
        );
    }

    if let Some(resources) = first_block(block, "resources") {
        container.resources = Some(ResourceRequirements {
            limits: quantity_map(resources, "limits"),
            requests: quantity_map(resources, "requests"),
            ..ResourceRequirements::default()
        });
    }

    if let Some(mounts) = list_field(block, "volume_mount") {
        container.volume_mounts = Some(
            mounts
                .iter()
                .map(|m| VolumeMount {
                    name: str_field(m, "name").unwrap_or_default().to_string(),
                    mount_path: str_field(m, "mount_path").unwrap_or_default().to_string(),
                    sub_path: str_field(m, "sub_path").map(str::to_string),
                    read_only: bool_field(m, "read_only"),
                    ..VolumeMount::default()
                })
                .collect(),
        );
    }

    container
}

fn quantity_map(
    block: &Value,
    key: &str,
) -> Option<std::collections::BTreeMap<String, Quantity>> {
    string_map_field(block, key).map(|m| {
        m.into_iter()
            .map(|(k, v)| (k, Quantity(v)))
            .collect()
    })
}

fn expand_volume(block: &Value) -> Volume {
    let mut volume = Volume {
        name: str_field(block, "name").unwrap_or_default().to_string(),
        ..Volume::default()
    };

    if let Some(name) = str_field(block, "config_map") {
        volume.config_map = Some(ConfigMapVolumeSource {
            name: name.to_string(),
            ..ConfigMapVolumeSource::default()
        });
    } else if let Some(name) = str_field(block, "secret") {
        volume.secret = Some(SecretVolumeSource {
            secret_name: Some(name.to_string()),
            ..SecretVolumeSource::default()
        });
    } else if let Some(claim) = str_field(block, "persistent_volume_claim") {
        volume.persistent_volume_claim = Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim.to_string(),
            read_only: None,
        });
    } else if bool_field(block, "empty_dir").unwrap_or(false) {
        volume.empty_dir = Some(EmptyDirVolumeSource::default());
    }
    volume
}

/// Flatten a `PodTemplateSpec` into a template list
pub fn flatten_pod_template(template: &PodTemplateSpec) -> Value {
    let mut m = Map::new();

    if let Some(meta) = &template.metadata {
        let has_content = meta.labels.as_ref().is_some_and(|l| !l.is_empty())
            || meta.annotations.as_ref().is_some_and(|a| !a.is_empty());
        if has_content {
            m.insert("metadata".into(), flatten_metadata(meta));
        }
    }
    if let Some(spec) = &template.spec {
        m.insert("spec".into(), flatten_pod_spec(spec));
    }
    wrap_block(m)
}

fn flatten_pod_spec(spec: &PodSpec) -> Value {
    let mut m = Map::new();

    if let Some(selector) = &spec.node_selector {
        if !selector.is_empty() {
            m.insert("node_selector".into(), string_map_value(selector));
        }
    }
    if let Some(sa) = &spec.service_account_name {
        m.insert("service_account_name".into(), Value::String(sa.clone()));
    }
    if let Some(secrets) = &spec.image_pull_secrets {
        let names: Vec<Value> = secrets
            .iter()
            .filter(|s| !s.name.is_empty())
            .map(|s| Value::String(s.name.clone()))
            .collect();
        if !names.is_empty() {
            m.insert("image_pull_secrets".into(), Value::Array(names));
        }
    }

    let containers: Vec<Value> = spec.containers.iter().map(flatten_container).collect();
    if !containers.is_empty() {
        m.insert("container".into(), Value::Array(containers));
    }
    if let Some(volumes) = &spec.volumes {
        let flattened: Vec<Value> = volumes.iter().map(flatten_volume).collect();
        if !flattened.is_empty() {
            m.insert("volume".into(), Value::Array(flattened));
        }
    }
    wrap_block(m)
}

fn flatten_container(container: &Container) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::String(container.name.clone()));
    if let Some(image) = &container.image {
        m.insert("image".into(), Value::String(image.clone()));
    }
    if let Some(command) = &container.command {
        m.insert("command".into(), string_list_value(command));
    }
    if let Some(args) = &container.args {
        m.insert("args".into(), string_list_value(args));
    }
    if let Some(dir) = &container.working_dir {
        m.insert("working_dir".into(), Value::String(dir.clone()));
    }
    if let Some(policy) = &container.image_pull_policy {
        m.insert("image_pull_policy".into(), Value::String(policy.clone()));
    }
    if let Some(env) = &container.env {
        let vars: Vec<Value> = env
            .iter()
            .map(|e| {
                let mut v = Map::new();
                v.insert("name".into(), Value::String(e.name.clone()));
                if let Some(value) = &e.value {
                    v.insert("value".into(), Value::String(value.clone()));
                }
                Value::Object(v)
            })
            .collect();
        if !vars.is_empty() {
            m.insert("env".into(), Value::Array(vars));
        }
    }
    if let Some(resources) = &container.resources {
        let mut r = Map::new();
        if let Some(limits) = &resources.limits {
            r.insert("limits".into(), quantity_map_value(limits));
        }
        if let Some(requests) = &resources.requests {
            r.insert("requests".into(), quantity_map_value(requests));
        }
        if !r.is_empty() {
            m.insert("resources".into(), wrap_block(r));
        }
    }
    if let Some(mounts) = &container.volume_mounts {
        let flattened: Vec<Value> = mounts
            .iter()
            .map(|mount| {
                let mut v = Map::new();
                v.insert("name".into(), Value::String(mount.name.clone()));
                v.insert("mount_path".into(), Value::String(mount.mount_path.clone()));
                if let Some(sub_path) = &mount.sub_path {
                    v.insert("sub_path".into(), Value::String(sub_path.clone()));
                }
                if let Some(read_only) = mount.read_only {
                    v.insert("read_only".into(), Value::Bool(read_only));
                }
                Value::Object(v)
            })
            .collect();
        if !flattened.is_empty() {
            m.insert("volume_mount".into(), Value::Array(flattened));
        }
    }
    Value::Object(m)
}

fn flatten_volume(volume: &Volume) -> Value {
    let mut m = Map::new();
    m.insert("name".into(), Value::String(volume.name.clone()));
    if let Some(cm) = &volume.config_map {
        if !cm.name.is_empty() {
            m.insert("config_map".into(), Value::String(cm.name.clone()));
        }
    }
    if let Some(secret) = &volume.secret {
        if let Some(name) = &secret.secret_name {
            m.insert("secret".into(), Value::String(name.clone()));
        }
    }
    if let Some(pvc) = &volume.persistent_volume_claim {
        m.insert(
            "persistent_volume_claim".into(),
            Value::String(pvc.claim_name.clone()),
        );
    }
    if volume.empty_dir.is_some() {
        m.insert("empty_dir".into(), Value::Bool(true));
    }
    Value::Object(m)
}

fn quantity_map_value(map: &std::collections::BTreeMap<String, Quantity>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.0.clone())))
            .collect(),
    )
}

fn string_list_value(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_defaults_the_namespace() {
        let state = json!({"metadata": [{"name": "mnist"}]});
        let meta = expand_metadata(&state);
        assert_eq!(meta.name.as_deref(), Some("mnist"));
        assert_eq!(meta.namespace.as_deref(), Some("default"));
        assert!(meta.labels.is_none());
    }

    #[test]
    fn metadata_round_trips_labels_and_computed_fields() {
        let meta = ObjectMeta {
            name: Some("mnist".into()),
            namespace: Some("training".into()),
            labels: Some([("team".to_string(), "ml".to_string())].into_iter().collect()),
            resource_version: Some("42".into()),
            uid: Some("abc-123".into()),
            generation: Some(2),
            ..ObjectMeta::default()
        };
        let state = json!({"metadata": flatten_metadata(&meta)});
        let block = first_block(&state, "metadata").unwrap();
        assert_eq!(str_field(block, "resource_version"), Some("42"));
        assert_eq!(block["labels"]["team"], "ml");

        let back = expand_metadata(&state);
        assert_eq!(back.name, meta.name);
        assert_eq!(back.namespace, meta.namespace);
        assert_eq!(back.labels, meta.labels);
    }

    #[test]
    fn pod_template_expands_containers_and_resources() {
        let state = json!({"template": [{
            "spec": [{
                "service_account_name": "trainer",
                "node_selector": {"gpu": "a100"},
                "container": [{
                    "name": "pytorch",
                    "image": "pytorch/pytorch:2.1",
                    "command": ["python", "train.py"],
                    "env": [{"name": "EPOCHS", "value": "10"}],
                    "resources": [{"limits": {"nvidia.com/gpu": "1"}}],
                    "volume_mount": [{"name": "data", "mount_path": "/data"}]
                }],
                "volume": [{"name": "data", "persistent_volume_claim": "training-data"}]
            }]
        }]});

        let template = expand_pod_template(&state);
        let spec = template.spec.unwrap();
        assert_eq!(spec.service_account_name.as_deref(), Some("trainer"));
        assert_eq!(spec.containers.len(), 1);

        let container = &spec.containers[0];
        assert_eq!(container.image.as_deref(), Some("pytorch/pytorch:2.1"));
        assert_eq!(
            container.command.as_deref(),
            Some(&["python".to_string(), "train.py".to_string()][..])
        );
        let limits = container.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits["nvidia.com/gpu"].0, "1");

        let volumes = spec.volumes.unwrap();
        assert_eq!(
            volumes[0].persistent_volume_claim.as_ref().unwrap().claim_name,
            "training-data"
        );
    }

    #[test]
    fn pod_template_flatten_is_the_inverse_of_expand() {
        let state = json!({"template": [{
            "spec": [{
                "container": [{
                    "name": "worker",
                    "image": "tf:latest",
                    "args": ["--steps", "100"]
                }]
            }]
        }]});
        let template = expand_pod_template(&state);
        let flattened = json!({"template": flatten_pod_template(&template)});
        let template2 = expand_pod_template(&flattened);
        assert_eq!(template, template2);
    }

    #[test]
    fn pull_secrets_and_config_map_names_round_trip() {
        let state = json!({"template": [{
            "spec": [{
                "image_pull_secrets": ["registry-creds"],
                "container": [{"name": "worker", "image": "tf:latest"}],
                "volume": [{"name": "cfg", "config_map": "settings"}]
            }]
        }]});

        let template = expand_pod_template(&state);
        let spec = template.spec.as_ref().unwrap();
        assert_eq!(
            spec.image_pull_secrets.as_ref().unwrap()[0].name,
            "registry-creds"
        );
        assert_eq!(
            spec.volumes.as_ref().unwrap()[0].config_map.as_ref().unwrap().name,
            "settings"
        );

        let flattened = json!({"template": flatten_pod_template(&template)});
        let block = first_block(&flattened, "template")
            .and_then(|t| first_block(t, "spec"))
            .unwrap();
        assert_eq!(block["image_pull_secrets"], json!(["registry-creds"]));
        assert_eq!(block["volume"][0]["config_map"], json!("settings"));
    }

    #[test]
    fn volume_sources_are_mutually_exclusive_in_expand() {
        let v = expand_volume(&json!({"name": "cfg", "config_map": "settings", "empty_dir": true}));
        assert!(v.config_map.is_some());
        assert!(v.empty_dir.is_none());

        let v = expand_volume(&json!({"name": "scratch", "empty_dir": true}));
        assert!(v.empty_dir.is_some());
    }

    #[test]
    fn empty_template_expands_to_defaults() {
        let template = expand_pod_template(&json!({}));
        assert!(template.spec.is_none());
        assert!(template.metadata.is_none());
    }
}
