//! Source registry: the fixed list of `(name, url)` pairs polled by a batch.
//!
//! # Built-in Sources
//!
//! | Name | Endpoint | Notes |
//! |------|----------|-------|
//! | `age_name` | agify.io | Age estimate for a first name |
//! | `exchange` | exchangerate.host | EUR rates for USD, GBP, JPY, CHF |
//! | `bitcoin` | coindesk.com | Current BTC price |
//! | `gender_name` | genderize.io | Gender probability for a first name |
//! | `universe` | le-systeme-solaire.net | Facts about Mars |
//!
//! An alternate registry can be loaded from YAML:
//!
//! ```yaml
//! sources:
//!   - name: weather
//!     url: https://api.example.com/weather.json
//! ```

use crate::error::RegistryError;
use itertools::Itertools;
use serde::Deserialize;
use std::path::Path;
use tracing::{info, instrument};
use url::Url;

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("age_name", "https://api.agify.io?name=laura"),
    (
        "exchange",
        "https://api.exchangerate.host/latest?base=EUR&symbols=USD,GBP,JPY,CHF",
    ),
    ("bitcoin", "https://api.coindesk.com/v1/bpi/currentprice.json"),
    ("gender_name", "https://api.genderize.io?name=andrea"),
    ("universe", "https://api.le-systeme-solaire.net/rest/bodies/mars"),
];

/// One external HTTP data provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    /// Unique name; also selects the normalization rule.
    pub name: String,
    /// Absolute `http` or `https` endpoint.
    pub url: String,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    sources: Vec<SourceSpec>,
}

/// A validated, immutable list of sources.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<SourceSpec>,
}

impl SourceRegistry {
    /// Validate and wrap a list of sources.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A name is empty
    /// - Two sources share a name
    /// - A URL does not parse or is not `http`/`https`
    pub fn new(sources: Vec<SourceSpec>) -> Result<Self, RegistryError> {
        if sources.iter().any(|s| s.name.trim().is_empty()) {
            return Err(RegistryError::EmptyName);
        }
        if let Some(dup) = sources.iter().map(|s| s.name.as_str()).duplicates().next() {
            return Err(RegistryError::DuplicateName(dup.to_string()));
        }
        for source in &sources {
            validate_url(source)?;
        }
        Ok(Self { sources })
    }

    /// The five sources polled when no registry file is given.
    pub fn builtin() -> Self {
        Self {
            sources: BUILTIN_SOURCES
                .iter()
                .map(|(name, url)| SourceSpec::new(*name, *url))
                .collect(),
        }
    }

    /// Load and validate a YAML registry file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let registry = Self::from_yaml_str(&text)?;
        info!(count = registry.len(), "Loaded source registry");
        Ok(registry)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(text)?;
        Self::new(file.sources)
    }

    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn validate_url(source: &SourceSpec) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidUrl {
        name: source.name.clone(),
        url: source.url.clone(),
        reason,
    };
    let parsed = Url::parse(&source.url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}
