//! Error types for the provider

use thiserror::Error;

/// Main error type for provider operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Validation error for resource configuration
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure to load or interpret the Kubernetes client configuration
    #[error("kubernetes config error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Malformed composite resource ID (expected `namespace/name`)
    #[error("invalid resource id {0:?}: expected namespace/name")]
    InvalidId(String),

    /// A state wait exceeded its timeout
    #[error("timed out waiting for {operation}: last state {last_state:?}")]
    Timeout {
        /// Name of the operation that timed out
        operation: String,
        /// State observed on the final poll
        last_state: String,
    },

    /// A state wait observed a state outside its pending/target sets
    #[error("unexpected state {state:?} while waiting for {operation}")]
    UnexpectedState {
        /// Name of the waiting operation
        operation: String,
        /// The offending state
        state: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true if this wraps a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(ae)) if ae.code == 404)
    }
}
