use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Host;
use super::repository::HostRepository;

/// File-based store for the local host inventory: in-memory `RwLock<HashMap>`
/// backed by one JSON file per host under `{data_dir}/hosts/`.
pub struct FileHostRepository {
    hosts: RwLock<HashMap<String, Host>>,
    dir: PathBuf,
}

impl FileHostRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            hosts: RwLock::new(HashMap::new()),
            dir: base_dir.as_ref().join("hosts"),
        }
    }
}

#[async_trait]
impl HostRepository for FileHostRepository {
    async fn list(&self) -> Vec<Host> {
        let mut hosts: Vec<Host> = self.hosts.read().await.values().cloned().collect();
        hosts.sort_by(|a, b| a.name.cmp(&b.name));
        hosts
    }

    async fn get(&self, id: &str) -> Option<Host> {
        self.hosts.read().await.get(id).cloned()
    }

    async fn save(&self, host: Host) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", host.id));
        let content = serde_json::to_string_pretty(&host)?;

        // Atomic write via temp file + rename
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &path)?;

        self.hosts.write().await.insert(host.id.clone(), host);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let existed = self.hosts.write().await.remove(id).is_some();
        let path = self.dir.join(format!("{id}.json"));
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(existed)
    }

    /// Load all host JSON files from disk into the in-memory map.
    async fn load_all(&self) -> Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            return Ok(());
        }

        let mut map = HashMap::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => match serde_json::from_str::<Host>(&content) {
                    Ok(host) => {
                        map.insert(host.id.clone(), host);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse host file");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read host file");
                }
            }
        }

        tracing::info!(count = map.len(), "loaded hosts");
        *self.hosts.write().await = map;
        Ok(())
    }
}
