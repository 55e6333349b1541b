//! Disposable (throwaway) email domain detection.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{CheckError, CheckResult};
use crate::utils::domain_of;

/// Domains compiled into the crate, one per line.
const BUILTIN_DOMAINS: &str = include_str!("../data/disposable_domains.txt");

/// Where the current domain list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposableListSource {
    Builtin,
    External,
}

/// Description of the loaded list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisposableListMetadata {
    pub source: DisposableListSource,
    pub total_domains: usize,
    /// `updated_at` from the dataset, if provided.
    pub last_updated: Option<String>,
    /// Upstream lists the dataset was built from.
    pub sources: Vec<String>,
}

/// On-disk dataset layout.
#[derive(Debug, Deserialize)]
struct Dataset {
    domains: Vec<String>,
    #[serde(default)]
    metadata: DatasetMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct DatasetMetadata {
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

/// Disposable domain detector
///
/// Lookups are case-insensitive. The list can be curated at runtime through
/// `&self`; concurrent readers are not blocked by each other.
#[derive(Debug)]
pub struct DisposableDetector {
    domains: RwLock<HashSet<String>>,
    source: DisposableListSource,
    last_updated: Option<String>,
    sources: Vec<String>,
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl DisposableDetector {
    /// Detector over the built-in list.
    pub fn builtin() -> Self {
        let domains: HashSet<String> = BUILTIN_DOMAINS
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(normalize)
            .collect();
        log::debug!("Loaded {} built-in disposable domains", domains.len());
        Self {
            domains: RwLock::new(domains),
            source: DisposableListSource::Builtin,
            last_updated: None,
            sources: Vec::new(),
        }
    }

    /// Detector over a caller-supplied list.
    pub fn from_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: RwLock::new(domains.into_iter().map(|d| normalize(d.as_ref())).collect()),
            source: DisposableListSource::External,
            last_updated: None,
            sources: Vec::new(),
        }
    }

    /// Parse a `{ "domains": [...], "metadata": {...} }` dataset.
    pub fn from_json(raw: &str) -> CheckResult<Self> {
        let dataset: Dataset = serde_json::from_str(raw)?;
        if dataset.domains.is_empty() {
            return Err(CheckError::ValidationError(
                "Disposable dataset contains no domains".to_string(),
            ));
        }
        let mut detector = Self::from_domains(&dataset.domains);
        detector.last_updated = dataset.metadata.updated_at;
        detector.sources = dataset.metadata.sources;
        Ok(detector)
    }

    /// Load a dataset file, falling back to the built-in list when it is
    /// missing or malformed.
    pub fn load_or_builtin(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let loaded = std::fs::read_to_string(path)
            .map_err(CheckError::from)
            .and_then(|raw| Self::from_json(&raw));
        match loaded {
            Ok(detector) => {
                log::info!(
                    "Loaded {} disposable domains from {}",
                    detector.len(),
                    path.display()
                );
                detector
            }
            Err(e) => {
                log::warn!(
                    "Cannot load disposable dataset {}, using built-in list: {e}",
                    path.display()
                );
                Self::builtin()
            }
        }
    }

    /// Whether the domain part of `email` is disposable.
    pub fn is_disposable(&self, email: &str) -> bool {
        domain_of(email).is_some_and(|domain| self.is_disposable_domain(domain))
    }

    pub fn is_disposable_domain(&self, domain: &str) -> bool {
        self.domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&normalize(domain))
    }

    /// Add a domain; returns `false` if it was already listed.
    pub fn add_domain(&self, domain: &str) -> bool {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize(domain))
    }

    /// Remove a domain; returns `false` if it was not listed.
    pub fn remove_domain(&self, domain: &str) -> bool {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&normalize(domain))
    }

    /// Sorted copy of the current list.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        domains.sort();
        domains
    }

    pub fn len(&self) -> usize {
        self.domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metadata(&self) -> DisposableListMetadata {
        DisposableListMetadata {
            source: self.source,
            total_domains: self.len(),
            last_updated: self.last_updated.clone(),
            sources: self.sources.clone(),
        }
    }
}

impl Default for DisposableDetector {
    fn default() -> Self {
        Self::builtin()
    }
}
