//! Terraform provider for Kubeflow Training Operator jobs
//!
//! This provider exposes the Kubeflow Training Operator custom resources
//! (TFJob, PyTorchJob, MPIJob, XGBoostJob, PaddleJob) as Terraform-managed
//! resources. Its job is mechanical translation:
//!
//! - **Expand**: Terraform's nested list-of-maps state into typed
//!   `kubeflow.org/v1` objects
//! - **Flatten**: Kubernetes objects back into Terraform state
//! - **CRUD**: create/get/update/delete through a dynamic (unstructured)
//!   client, JSON Patch for updates
//! - **Wait**: poll job status conditions until a terminal phase
//!
//! # Modules
//!
//! - [`api`] - Typed Kubeflow CRD structs (five job kinds + common types)
//! - [`client`] - Dynamic Kubernetes client wrapper with per-kind CRUD
//! - [`schema`] - Terraform schema declarations and expand/flatten
//! - [`patch`] - RFC 6902 patch operations for updates
//! - [`wait`] - Generic pending/target state-change waiter
//! - [`resource`] - Per-kind lifecycle callbacks (create/read/update/delete)
//! - [`provider`] - Resource registry and provider configuration
//! - [`plugin`] - Terraform plugin protocol (v6) gRPC server
//! - [`proto`] - Generated tfplugin6 protobuf/gRPC code
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod api;
pub mod client;
pub mod error;
pub mod patch;
pub mod plugin;
pub mod proto;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod wait;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the Kubeflow Training Operator CRDs
pub const KUBEFLOW_GROUP: &str = "kubeflow.org";

/// API version of the Kubeflow Training Operator CRDs
pub const KUBEFLOW_VERSION: &str = "v1";

/// How long a create waits for the job to reach `Succeeded`
pub const CREATE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(40 * 60);

/// How long a delete waits for the object to disappear
pub const DELETE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5 * 60);
