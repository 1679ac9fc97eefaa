//! `kubeflow_xgboost_job` lifecycle

use crate::resource::job_resource;

job_resource!(
    XgboostJobResource,
    "kubeflow_xgboost_job",
    "XGBoostJob",
    xgboost_job,
    create_xgboost_job,
    get_xgboost_job,
    update_xgboost_job,
    delete_xgboost_job
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTrainingClient;
    use crate::provider::ManagedResource;
    use serde_json::json;

    #[tokio::test]
    async fn exists_returns_true_for_a_live_job() {
        let expanded = crate::schema::xgboost_job::expand(&json!({
            "metadata": [{"name": "boost", "namespace": "ml"}],
            "spec": [{"xgb_replica_specs": [{"master": [{"replicas": 1}]}]}],
        }))
        .unwrap();

        let mut client = MockTrainingClient::new();
        client
            .expect_get_xgboost_job()
            .withf(|namespace, name| namespace == "ml" && name == "boost")
            .returning(move |_, _| Ok(expanded.clone()));

        let state = json!({"id": "ml/boost"});
        assert!(XgboostJobResource.exists(&client, &state).await.unwrap());
    }
}
