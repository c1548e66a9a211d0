//! Hostname to TLS certificate resolution

use std::fs;
use std::path::Path;

use deploycat_model::{CertRef, CertificateConfig};
use regex::Regex;
use serde_json::Value;
use tracing::{info, instrument};

use crate::Result;
use crate::rules::{self, RuleMap};

/// Compiled `(hostPattern, certificateReference)` rule
#[derive(Clone, Debug)]
pub struct CertRule {
    pattern: Regex,
    cert: CertRef,
}

impl CertRule {
    /// Pattern matched anywhere in a hostname
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Certificate applied on match
    #[must_use]
    pub fn cert(&self) -> &CertRef {
        &self.cert
    }
}

/// Ordered certificate rules, immutable once built and shared by every request
#[derive(Clone, Debug, Default)]
pub struct CertResolver {
    rules: Vec<CertRule>,
}

/// Shape of the raw certificate configuration document
#[must_use]
pub fn config_rules() -> RuleMap {
    RuleMap::new().array(
        "certs",
        RuleMap::new().field("match", [rules::is_regex()]).object(
            "cert",
            RuleMap::new().field("secretName", [rules::optional_string()]),
        ),
    )
}

impl CertResolver {
    /// Compiles every pattern of an already deserialized configuration
    ///
    /// # Errors
    /// Returns [`crate::Error::Regex`] on the first pattern that does not compile.
    pub fn from_config(config: &CertificateConfig) -> Result<Self> {
        let rules = config
            .certs
            .iter()
            .map(|entry| -> Result<CertRule> {
                Ok(CertRule {
                    pattern: Regex::new(&entry.pattern)?,
                    cert: entry.cert.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Parses, validates and compiles a JSON configuration document
    ///
    /// # Errors
    /// Fails if the document is not JSON, does not pass [`config_rules`], or
    /// contains a pattern that does not compile.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        let config: CertificateConfig = config_rules().parse(value)?;
        Self::from_config(&config)
    }

    /// Loads the configuration file at `path`
    ///
    /// # Errors
    /// Fails if the file cannot be read or [`CertResolver::from_json`] fails.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let resolver = Self::from_json(&raw)?;
        info!(rules = resolver.len(), "certificate rules loaded");
        Ok(resolver)
    }

    /// Certificate of the first rule whose pattern occurs in `host`
    #[must_use]
    pub fn resolve(&self, host: &str) -> Option<&CertRef> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(host))
            .map(|rule| &rule.cert)
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rule is configured, every host falls back to a per-app secret
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in evaluation order
    pub fn rules(&self) -> impl Iterator<Item = &CertRule> {
        self.rules.iter()
    }
}
