use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::errors::RegistryError;
use crate::model::SelectorRegistry;

/// Load/save access to per-page registries.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn load(&self, page: &str) -> Result<Option<SelectorRegistry>, RegistryError>;
    async fn save(&self, registry: &SelectorRegistry) -> Result<(), RegistryError>;
    async fn pages(&self) -> Result<Vec<String>, RegistryError>;
}

/// One YAML file per page under a root directory.
#[derive(Debug, Clone)]
pub struct FileRegistryStore {
    root: PathBuf,
}

impl FileRegistryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, page: &str) -> Result<PathBuf, RegistryError> {
        let stem = file_stem(page)?;
        Ok(self.root.join(format!("{stem}.yaml")))
    }
}

fn file_stem(page: &str) -> Result<String, RegistryError> {
    let stem: String = page
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.trim_matches('_').is_empty() {
        return Err(RegistryError::InvalidPage(page.to_string()));
    }
    Ok(stem)
}

#[async_trait]
impl RegistryStore for FileRegistryStore {
    async fn load(&self, page: &str) -> Result<Option<SelectorRegistry>, RegistryError> {
        let path = self.path_for(page)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(RegistryError::io(path, err)),
        };
        let registry: SelectorRegistry = serde_yaml::from_str(&raw)?;
        debug!(page, entries = registry.len(), "registry loaded");
        Ok(Some(registry))
    }

    async fn save(&self, registry: &SelectorRegistry) -> Result<(), RegistryError> {
        let path = self.path_for(&registry.page)?;
        let body = serde_yaml::to_string(registry)?;
        let root = self.root.clone();
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&root, &target, body.as_bytes()))
            .await
            .map_err(|err| RegistryError::Internal(format!("registry writer panicked: {err}")))??;
        info!(page = %registry.page, entries = registry.len(), path = %path.display(), "registry saved");
        Ok(())
    }

    async fn pages(&self) -> Result<Vec<String>, RegistryError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(RegistryError::io(self.root.clone(), err)),
        };
        let mut pages = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| RegistryError::io(self.root.clone(), err))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("yaml") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    pages.push(stem.to_string());
                }
            }
        }
        pages.sort();
        Ok(pages)
    }
}

fn write_atomic(root: &Path, target: &Path, body: &[u8]) -> Result<(), RegistryError> {
    std::fs::create_dir_all(root).map_err(|err| RegistryError::io(root, err))?;
    let mut tmp = tempfile::NamedTempFile::new_in(root).map_err(|err| RegistryError::io(root, err))?;
    tmp.write_all(body)
        .map_err(|err| RegistryError::io(tmp.path(), err))?;
    tmp.persist(target)
        .map_err(|err| RegistryError::io(target, err.error))?;
    Ok(())
}

/// Process-local store, used by tests and by sessions that never persist registries.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    pages: DashMap<String, SelectorRegistry>,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: SelectorRegistry) -> Self {
        let store = Self::new();
        store.pages.insert(registry.page.clone(), registry);
        store
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn load(&self, page: &str) -> Result<Option<SelectorRegistry>, RegistryError> {
        Ok(self.pages.get(page).map(|entry| entry.value().clone()))
    }

    async fn save(&self, registry: &SelectorRegistry) -> Result<(), RegistryError> {
        self.pages.insert(registry.page.clone(), registry.clone());
        Ok(())
    }

    async fn pages(&self) -> Result<Vec<String>, RegistryError> {
        let mut pages: Vec<String> = self.pages.iter().map(|entry| entry.key().clone()).collect();
        pages.sort();
        Ok(pages)
    }
}
