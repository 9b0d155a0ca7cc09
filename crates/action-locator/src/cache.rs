//! Learning strategy cache
//!
//! Keeps, per fingerprint, the strategy list that once resolved an element and
//! reinforces whichever strategy keeps winning. The whole cache is rewritten to
//! its backing file after every mutation through a temp file and rename, so a
//! crash leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::CacheError;
use crate::fingerprint::Fingerprint;
use crate::types::{normalize_strategies, LocatorStrategy};

pub const DEFAULT_REINFORCEMENT: u8 = 5;
pub const DEFAULT_MAX_PRIORITY: u8 = 100;

/// Cached strategies for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyCacheEntry {
    /// Unique by selector, sorted by priority descending
    pub strategies: Vec<LocatorStrategy>,
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    pub last_used: DateTime<Utc>,
}

/// Reinforcement settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Priority added to a strategy each time it wins from the cache
    pub reinforcement: u8,
    /// Ceiling for reinforced priorities
    pub max_priority: u8,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            reinforcement: DEFAULT_REINFORCEMENT,
            max_priority: DEFAULT_MAX_PRIORITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_cached: usize,
    pub successful_strategies: u64,
    pub average_success_rate: f64,
}

pub struct StrategyCache {
    entries: RwLock<BTreeMap<String, StrategyCacheEntry>>,
    storage_path: Option<PathBuf>,
    policy: CachePolicy,
}

impl StrategyCache {
    /// Cache without a backing file
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            storage_path: None,
            policy: CachePolicy::default(),
        }
    }

    /// Load the cache from `path`; a missing or empty file starts an empty cache
    pub fn with_persistence(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| CacheError::Corrupt {
                path: path.clone(),
                reason: err.to_string(),
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(CacheError::io(path, err)),
        };
        debug!(path = %path.display(), entries = entries.len(), "strategy cache loaded");
        Ok(Self {
            entries: RwLock::new(entries),
            storage_path: Some(path),
            policy: CachePolicy::default(),
        })
    }

    /// Empty cache that will write to `path`, discarding whatever is there on first mutation
    pub fn fresh_at(path: impl Into<PathBuf>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            storage_path: Some(path.into()),
            policy: CachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    /// Cached strategies, highest priority first; no side effects
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Vec<LocatorStrategy>> {
        self.entries
            .read()
            .get(fingerprint.as_str())
            .map(|entry| entry.strategies.clone())
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Option<StrategyCacheEntry> {
        self.entries.read().get(fingerprint.as_str()).cloned()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.read().contains_key(fingerprint.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn fingerprints(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Reinforce `selector` under `fingerprint`. Returns false (and changes nothing)
    /// when the fingerprint is not cached.
    pub fn record_success(&self, fingerprint: &Fingerprint, selector: &str) -> bool {
        {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(fingerprint.as_str()) else {
                return false;
            };
            if let Some(strategy) = entry
                .strategies
                .iter_mut()
                .find(|strategy| strategy.selector == selector)
            {
                strategy.priority = strategy
                    .priority
                    .saturating_add(self.policy.reinforcement)
                    .min(self.policy.max_priority.max(strategy.priority));
            }
            entry.success_count += 1;
            entry.last_used = Utc::now();
            entry
                .strategies
                .sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        self.persist_or_warn("record_success");
        true
    }

    /// Count a cache hit whose strategies all failed
    pub fn record_failure(&self, fingerprint: &Fingerprint) -> bool {
        {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(fingerprint.as_str()) else {
                return false;
            };
            entry.failure_count += 1;
            entry.last_used = Utc::now();
        }
        self.persist_or_warn("record_failure");
        true
    }

    /// Store the strategy list that first resolved `fingerprint`
    pub fn put(&self, fingerprint: &Fingerprint, strategies: Vec<LocatorStrategy>) {
        if fingerprint.is_empty() {
            return;
        }
        let entry = StrategyCacheEntry {
            strategies: normalize_strategies(strategies),
            success_count: 1,
            failure_count: 0,
            last_used: Utc::now(),
        };
        info!(
            fingerprint = %fingerprint,
            strategies = entry.strategies.len(),
            "caching resolved strategies"
        );
        self.entries
            .write()
            .insert(fingerprint.as_str().to_string(), entry);
        self.persist_or_warn("put");
    }

    /// Add strategies not yet cached for an existing fingerprint
    pub fn merge(&self, fingerprint: &Fingerprint, strategies: Vec<LocatorStrategy>) -> bool {
        {
            let mut entries = self.entries.write();
            let Some(entry) = entries.get_mut(fingerprint.as_str()) else {
                return false;
            };
            let mut combined = std::mem::take(&mut entry.strategies);
            combined.extend(strategies);
            entry.strategies = normalize_strategies(combined);
        }
        self.persist_or_warn("merge");
        true
    }

    /// Empty memory and storage
    pub fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().clear();
        if let Some(path) = &self.storage_path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(CacheError::io(path, err)),
            }
        }
        info!("strategy cache cleared");
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read();
        let successes: u64 = entries.values().map(|entry| entry.success_count).sum();
        let strategies: usize = entries.values().map(|entry| entry.strategies.len()).sum();
        CacheStats {
            total_cached: entries.len(),
            successful_strategies: successes,
            average_success_rate: if strategies == 0 {
                0.0
            } else {
                successes as f64 / strategies as f64
            },
        }
    }

    fn persist_or_warn(&self, operation: &str) {
        if let Err(err) = self.persist() {
            warn!(error = %err, operation, "strategy cache persist failed");
        }
    }

    fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = self.storage_path.as_ref() else {
            return Ok(());
        };
        let body = {
            let entries = self.entries.read();
            serde_json::to_vec_pretty(&*entries).map_err(|err| CacheError::Corrupt {
                path: path.clone(),
                reason: err.to_string(),
            })?
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|err| CacheError::io(&dir, err))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|err| CacheError::io(&dir, err))?;
        tmp.write_all(&body)
            .map_err(|err| CacheError::io(tmp.path(), err))?;
        tmp.persist(path)
            .map_err(|err| CacheError::io(path, err.error))?;
        Ok(())
    }
}
