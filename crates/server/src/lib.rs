// Copyright 2026 Deploycat Maintainers
// SPDX-License-Identifier: Apache-2.0

//! Deploycat internals: turns an App request into a workload, a service and
//! an ingress, and joins them back into a single App view.

/// Generic Error for the App lifecycle
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// User input failed validation, never reaches the cluster
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    /// A required child resource does not exist
    #[error("Not Found: {kind} {name}")]
    NotFound {
        /// Kubernetes kind of the missing object
        kind: String,
        /// Name of the missing object
        name: String,
    },

    /// The cluster refused to create an object that already exists
    #[error("Conflict: {kind} {name} already exists")]
    Conflict {
        /// Kubernetes kind of the conflicting object
        kind: String,
        /// Name of the conflicting object
        name: String,
    },

    /// Kubernetes internal error
    #[error("Kube Error: {0}")]
    KubeError(#[from] kube::Error),

    /// A cluster call did not finish within the configured deadline
    #[error("Timeout: {operation} {kind}")]
    Timeout {
        /// Kubernetes kind the call targeted
        kind: String,
        /// Operation that timed out (create, get, delete, list)
        operation: &'static str,
    },

    /// Create failed after some child resources were made, they have been rolled back
    #[error("Partial Failure: creating {stage} failed: {source}")]
    PartialFailure {
        /// Kind of the child resource whose creation failed
        stage: &'static str,
        /// The original failure
        source: Box<Error>,
    },

    /// Invalid settings
    #[error("Config Error: {0}")]
    Config(String),

    /// `serde` errors
    #[error("Serialization Error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// Certificate rule patterns that do not compile
    #[error("Regex Error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// True when the error means the requested object does not exist
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Generic result type used across the service
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub mod certs;
pub mod cluster;
pub mod config;
pub mod http;
pub mod orchestrator;
pub mod rules;
pub mod telemetry;
pub mod templates;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::certs::CertResolver;
pub use crate::cluster::{Cluster, KubeCluster, ResourceStore};
pub use crate::config::Settings;
pub use crate::orchestrator::Orchestrator;
pub use crate::rules::{ErrorMap, FieldErrors, Rule, RuleMap, ValidationError};
