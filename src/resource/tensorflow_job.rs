//! `kubeflow_tf_job` lifecycle

use crate::resource::job_resource;

job_resource!(
    TfJobResource,
    "kubeflow_tf_job",
    "TFJob",
    tensorflow_job,
    create_tf_job,
    get_tf_job,
    update_tf_job,
    delete_tf_job
);
