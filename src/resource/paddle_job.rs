//! `kubeflow_paddle_job` lifecycle

use crate::resource::job_resource;

job_resource!(
    PaddleJobResource,
    "kubeflow_paddle_job",
    "PaddleJob",
    paddle_job,
    create_paddle_job,
    get_paddle_job,
    update_paddle_job,
    delete_paddle_job
);
