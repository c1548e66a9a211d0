//! App request and view types

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Body of `POST /app/{name}` with the path name merged in
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct AppRequest {
    /// App name, shared by the workload, service and ingress
    #[schemars(length(min = 4, max = 58))]
    #[schemars(regex(pattern = r"^[a-z]([-a-z0-9]*[a-z0-9])?$"))]
    pub name: String,
    /// Container image reference (e.g., "traefik/whoami")
    #[schemars(length(min = 4))]
    pub image: String,
    /// Public hostname routed by the ingress
    #[schemars(length(min = 11, max = 63))]
    pub host: String,
    /// Owner of the App, stored as the `user` label
    #[schemars(length(min = 3, max = 63))]
    #[schemars(regex(pattern = r"^[\w-]{3,}$"))]
    pub user: String,
    /// Port the container listens on
    #[schemars(range(min = 1, max = 65535))]
    pub port: i32,
}

/// Observed lifecycle of an App, recomputed from its child resources on every read
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum AppPhase {
    /// None of the child resources exist
    #[default]
    Absent,
    /// Some, but not all, child resources exist
    PartiallyCreated,
    /// All child resources exist but the workload is not available yet
    Pending,
    /// The workload reports `Available=True`
    Ready,
    /// At least one child resource is being deleted
    Deleting,
}

/// First condition reported by the workload
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct AppCondition {
    /// Condition type (e.g., "Available", "Progressing")
    #[serde(rename = "type")]
    pub type_: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    /// Machine readable reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Unified view of an App joined from its workload, service and ingress.
///
/// Fields sourced from a child resource that is missing stay `None`.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// App name
    pub name: String,
    /// Image of the workload's first container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Host of the ingress' first rule
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Owner label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Port exposed by the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// First condition reported by the workload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppCondition>,
    /// Creation time of the service, RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    /// Derived lifecycle phase
    pub phase: AppPhase,
}
