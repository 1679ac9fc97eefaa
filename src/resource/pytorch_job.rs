//! `kubeflow_pytorch_job` lifecycle

use crate::resource::job_resource;

job_resource!(
    PyTorchJobResource,
    "kubeflow_pytorch_job",
    "PyTorchJob",
    pytorch_job,
    create_pytorch_job,
    get_pytorch_job,
    update_pytorch_job,
    delete_pytorch_job
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{JobCondition, JobConditionType, JobStatus, PyTorchJob};
    use crate::client::MockTrainingClient;
    use crate::error::Error;
    use crate::provider::ManagedResource;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn base_state() -> serde_json::Value {
        json!({
            "metadata": [{"name": "bert", "namespace": "training"}],
            "spec": [{
                "pytorch_replica_specs": [{
                    "master": [{"replicas": 1}],
                    "worker": [{"replicas": 3}],
                }],
            }],
        })
    }

    fn with_condition(
        mut job: PyTorchJob,
        type_: JobConditionType,
        status: &str,
    ) -> PyTorchJob {
        job.status = Some(JobStatus {
            conditions: vec![JobCondition::new(type_, status)],
            ..JobStatus::default()
        });
        job
    }

    fn not_found() -> Error {
        Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".into(),
            message: "not found".into(),
            reason: "NotFound".into(),
            code: 404,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn create_polls_through_running_to_succeeded() {
        let expanded = crate::schema::pytorch_job::expand(&base_state()).unwrap();
        let polls = Arc::new(AtomicU32::new(0));
        let p = polls.clone();

        let mut client = MockTrainingClient::new();
        client
            .expect_create_pytorch_job()
            .times(1)
            .returning(move |job| Ok(job.clone()));
        client.expect_get_pytorch_job().returning(move |_, _| {
            let n = p.fetch_add(1, Ordering::SeqCst);
            let job = expanded.clone();
            Ok(match n {
                0 => with_condition(job, JobConditionType::Created, "True"),
                1 => with_condition(job, JobConditionType::Running, "True"),
                _ => with_condition(job, JobConditionType::Succeeded, "True"),
            })
        });

        let out = PyTorchJobResource
            .create(&client, &base_state())
            .await
            .unwrap();
        assert_eq!(out["id"], json!("training/bert"));
        assert!(polls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn create_fails_fast_when_the_job_fails() {
        let expanded = crate::schema::pytorch_job::expand(&base_state()).unwrap();

        let mut client = MockTrainingClient::new();
        client
            .expect_create_pytorch_job()
            .returning(move |job| Ok(job.clone()));
        client.expect_get_pytorch_job().returning(move |_, _| {
            Ok(with_condition(
                expanded.clone(),
                JobConditionType::Failed,
                "True",
            ))
        });

        let result = PyTorchJobResource.create(&client, &base_state()).await;
        match result {
            Err(Error::UnexpectedState { state, .. }) => assert_eq!(state, "Failed"),
            other => panic!("expected UnexpectedState, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_reports_a_deleted_job_as_absent() {
        let mut client = MockTrainingClient::new();
        client
            .expect_get_pytorch_job()
            .returning(|_, _| Err(not_found()));

        let state = json!({"id": "training/bert"});
        let out = PyTorchJobResource.read(&client, &state).await.unwrap();
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn update_patches_labels_and_reads_back() {
        let prior = json!({
            "id": "training/bert",
            "metadata": [{"name": "bert", "namespace": "training", "labels": {"team": "ml"}}],
        });
        let planned = json!({
            "id": "training/bert",
            "metadata": [{"name": "bert", "namespace": "training", "labels": {"team": "nlp"}}],
        });

        let expanded = crate::schema::pytorch_job::expand(&json!({
            "metadata": [{"name": "bert", "namespace": "training", "labels": {"team": "nlp"}}],
            "spec": [{"pytorch_replica_specs": [{"worker": [{"replicas": 1}]}]}],
        }))
        .unwrap();

        let mut client = MockTrainingClient::new();
        client
            .expect_update_pytorch_job()
            .times(1)
            .withf(|namespace, name, patch| {
                namespace == "training"
                    && name == "bert"
                    && serde_json::to_string(patch)
                        .unwrap()
                        .contains("/metadata/labels/team")
            })
            .returning(|_, name, _| Ok(PyTorchJob::new(name, Default::default())));
        client
            .expect_get_pytorch_job()
            .returning(move |_, _| Ok(expanded.clone()));

        let out = PyTorchJobResource
            .update(&client, &prior, &planned)
            .await
            .unwrap();
        assert_eq!(out["id"], json!("training/bert"));
        assert_eq!(out["metadata"][0]["labels"]["team"], json!("nlp"));
    }

    #[tokio::test]
    async fn update_without_metadata_changes_skips_the_patch() {
        let state = json!({
            "id": "training/bert",
            "metadata": [{"name": "bert", "namespace": "training"}],
        });

        let expanded = crate::schema::pytorch_job::expand(&json!({
            "metadata": [{"name": "bert", "namespace": "training"}],
            "spec": [{"pytorch_replica_specs": [{"worker": [{"replicas": 1}]}]}],
        }))
        .unwrap();

        let mut client = MockTrainingClient::new();
        client.expect_update_pytorch_job().times(0);
        client
            .expect_get_pytorch_job()
            .returning(move |_, _| Ok(expanded.clone()));

        let out = PyTorchJobResource
            .update(&client, &state, &state)
            .await
            .unwrap();
        assert_eq!(out["id"], json!("training/bert"));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_waits_until_the_object_is_gone() {
        let expanded = crate::schema::pytorch_job::expand(&json!({
            "metadata": [{"name": "bert", "namespace": "training"}],
            "spec": [{"pytorch_replica_specs": [{"worker": [{"replicas": 1}]}]}],
        }))
        .unwrap();

        let polls = Arc::new(AtomicU32::new(0));
        let p = polls.clone();

        let mut client = MockTrainingClient::new();
        client
            .expect_delete_pytorch_job()
            .times(1)
            .returning(|_, _| Ok(()));
        client.expect_get_pytorch_job().returning(move |_, _| {
            if p.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(expanded.clone())
            } else {
                Err(not_found())
            }
        });

        let state = json!({"id": "training/bert"});
        PyTorchJobResource.delete(&client, &state).await.unwrap();
        assert!(polls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn exists_distinguishes_present_from_absent() {
        let mut client = MockTrainingClient::new();
        client
            .expect_get_pytorch_job()
            .returning(|_, _| Err(not_found()));
        let state = json!({"id": "training/bert"});
        assert!(!PyTorchJobResource.exists(&client, &state).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_any_api_call() {
        let client = MockTrainingClient::new();
        let state = json!({"id": "just-a-name"});
        let result = PyTorchJobResource.read(&client, &state).await;
        assert!(matches!(result, Err(Error::InvalidId(_))));
    }
}
