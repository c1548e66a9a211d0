//! Certificate rule configuration

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw certificate configuration file, loaded once at startup
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct CertificateConfig {
    /// Ordered rules, the first matching one wins
    pub certs: Vec<CertEntry>,
}

/// A single `(hostPattern, certificateReference)` rule
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct CertEntry {
    /// Regular expression matched anywhere in the hostname
    #[serde(rename = "match")]
    #[schemars(length(min = 1))]
    pub pattern: String,
    /// Certificate applied when the pattern matches
    #[serde(default)]
    pub cert: CertRef,
}

/// Reference to the TLS material of an ingress
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertRef {
    /// Secret holding the certificate, the ingress controller default is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}
