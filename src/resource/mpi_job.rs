//! `kubeflow_mpi_job` lifecycle

use crate::resource::job_resource;

job_resource!(
    MpiJobResource,
    "kubeflow_mpi_job",
    "MPIJob",
    mpi_job,
    create_mpi_job,
    get_mpi_job,
    update_mpi_job,
    delete_mpi_job
);
