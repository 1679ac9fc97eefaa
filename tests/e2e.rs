//! End-to-end integration tests for the provider's Kubernetes plumbing
//!
//! These tests require a cluster with the Kubeflow Training Operator
//! installed (its CRDs at minimum). They are ignored by default:
//!
//! ```bash
//! cargo test --test e2e -- --ignored
//! ```
//!
//! The tests exercise the same client and lifecycle paths Terraform drives,
//! without going through the plugin protocol.

use serde_json::json;

use kubeflow_training_provider::client::{KubeTrainingClient, TrainingClient};
use kubeflow_training_provider::patch::{metadata_patch_ops, to_json_patch};
use kubeflow_training_provider::provider::ManagedResource;
use kubeflow_training_provider::resource::PyTorchJobResource;
use kubeflow_training_provider::schema;
use kubeflow_training_provider::api::PyTorchJob;

const NAMESPACE: &str = "default";

async fn test_client() -> KubeTrainingClient {
    let client = kube::Client::try_default()
        .await
        .expect("cluster connection (is a kubeconfig available?)");
    KubeTrainingClient::new(client)
}

/// A minimal PyTorchJob the operator's CRD validation accepts
fn sample_pytorch_job(name: &str) -> PyTorchJob {
    serde_json::from_value(json!({
        "apiVersion": "kubeflow.org/v1",
        "kind": "PyTorchJob",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "spec": {
            "pytorchReplicaSpecs": {
                "Worker": {
                    "replicas": 1,
                    "restartPolicy": "Never",
                    "template": {
                        "spec": {
                            "containers": [{
                                "name": "pytorch",
                                "image": "docker.io/kubeflowkatib/pytorch-mnist-cpu:v0.16.0",
                                "command": ["python3", "/opt/pytorch-mnist/mnist.py", "--epochs=1"],
                            }],
                        },
                    },
                },
            },
        },
    }))
    .expect("valid fixture")
}

async fn cleanup(client: &KubeTrainingClient, name: &str) {
    let _ = client.delete_pytorch_job(NAMESPACE, name).await;
}

#[tokio::test]
#[ignore = "requires a cluster with the training operator CRDs"]
async fn pytorch_job_crud_round_trip() {
    let client = test_client().await;
    let name = "e2e-crud";
    cleanup(&client, name).await;

    // Create and read back.
    let created = client
        .create_pytorch_job(&sample_pytorch_job(name))
        .await
        .expect("create");
    assert_eq!(created.metadata.name.as_deref(), Some(name));

    let fetched = client.get_pytorch_job(NAMESPACE, name).await.expect("get");
    assert_eq!(
        fetched.spec.pytorch_replica_specs["Worker"].replicas,
        Some(1)
    );

    // Patch a label the way an update does.
    let old_meta = json!({});
    let new_meta = json!({"labels": {"managed-by": "e2e"}});
    let patch = to_json_patch(&metadata_patch_ops(&old_meta, &new_meta)).expect("patch");
    let patched = client
        .update_pytorch_job(NAMESPACE, name, patch)
        .await
        .expect("update");
    assert_eq!(
        patched.metadata.labels.as_ref().and_then(|l| l.get("managed-by")),
        Some(&"e2e".to_string())
    );

    // Delete; the object may linger briefly behind finalizers.
    client
        .delete_pytorch_job(NAMESPACE, name)
        .await
        .expect("delete");
}

#[tokio::test]
#[ignore = "requires a cluster with the training operator CRDs"]
async fn resource_read_flattens_live_state() {
    let client = test_client().await;
    let name = "e2e-read";
    cleanup(&client, name).await;

    client
        .create_pytorch_job(&sample_pytorch_job(name))
        .await
        .expect("create");

    let state = json!({"id": format!("{NAMESPACE}/{name}")});
    let read = PyTorchJobResource
        .read(&client, &state)
        .await
        .expect("read")
        .expect("present");

    let metadata = schema::first_block(&read, "metadata").expect("metadata block");
    assert_eq!(schema::str_field(metadata, "name"), Some(name));
    assert_eq!(schema::str_field(metadata, "namespace"), Some(NAMESPACE));
    let spec = schema::first_block(&read, "spec").expect("spec block");
    assert!(spec.get("pytorch_replica_specs").is_some());

    cleanup(&client, name).await;
}

#[tokio::test]
#[ignore = "requires a cluster with the training operator CRDs"]
async fn reading_a_missing_job_reports_absence() {
    let client = test_client().await;
    let state = json!({"id": "default/e2e-does-not-exist"});
    let read = PyTorchJobResource.read(&client, &state).await.expect("read");
    assert!(read.is_none());
}
