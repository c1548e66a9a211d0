//! Process settings read from the environment

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_CERTS_CONFIG: &str = "./config.json";
const DEFAULT_CLUSTER_TIMEOUT_SECS: u64 = 30;

/// Startup settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Address the HTTP server listens on (`BIND_ADDR`)
    pub bind_addr: String,
    /// Namespace Apps live in (`DEPLOYCAT_NAMESPACE`), the client default when unset
    pub namespace: Option<String>,
    /// Certificate rules file (`CERTS_CONFIG`)
    pub certs_config: PathBuf,
    /// Deadline of every cluster call (`CLUSTER_TIMEOUT_SECS`)
    pub cluster_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            namespace: None,
            certs_config: PathBuf::from(DEFAULT_CERTS_CONFIG),
            cluster_timeout: Duration::from_secs(DEFAULT_CLUSTER_TIMEOUT_SECS),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Reads the settings, falling back to defaults for unset variables
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `CLUSTER_TIMEOUT_SECS` is not a positive integer.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cluster_timeout = match non_empty("CLUSTER_TIMEOUT_SECS") {
            None => defaults.cluster_timeout,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(Error::Config(format!(
                        "CLUSTER_TIMEOUT_SECS must be a positive integer, got {raw:?}"
                    )));
                }
            },
        };

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            namespace: non_empty("DEPLOYCAT_NAMESPACE"),
            certs_config: non_empty("CERTS_CONFIG").map_or(defaults.certs_config, PathBuf::from),
            cluster_timeout,
        })
    }
}
