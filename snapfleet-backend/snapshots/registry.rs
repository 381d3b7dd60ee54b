//! Local registry of confirmed snapshots, keyed by host id.
//!
//! The registry is a mirror of provider-confirmed state: entries are written
//! only after the provider reports success, and removed only after a
//! provider-side destroy succeeds. It is persisted write-through to
//! `snapshots.yaml` so a restart doesn't lose the local view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::Snapshot;

/// Root structure for `snapshots.yaml`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryFile {
    /// host id → snapshots, in creation order.
    hosts: HashMap<String, Vec<Snapshot>>,
}

pub struct SnapshotRegistry {
    entries: RwLock<HashMap<String, Vec<Snapshot>>>,
    path: PathBuf,
}

impl SnapshotRegistry {
    /// Load the persisted registry. Returns an empty registry if the file
    /// doesn't exist or can't be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_yaml::from_str::<RegistryFile>(&contents) {
                Ok(file) => {
                    let count: usize = file.hosts.values().map(Vec::len).sum();
                    tracing::info!(hosts = file.hosts.len(), snapshots = count, "loaded snapshot registry");
                    file.hosts
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse snapshot registry, starting empty");
                    HashMap::new()
                }
            },
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read snapshot registry");
                }
                HashMap::new()
            }
        };
        Self {
            entries: RwLock::new(entries),
            path,
        }
    }

    pub async fn list(&self, host_id: &str) -> Vec<Snapshot> {
        self.entries
            .read()
            .await
            .get(host_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn get(&self, host_id: &str, snapshot_id: &str) -> Option<Snapshot> {
        self.entries
            .read()
            .await
            .get(host_id)?
            .iter()
            .find(|s| s.id == snapshot_id)
            .cloned()
    }

    /// Record a confirmed snapshot. A snapshot with the same id replaces the
    /// old entry, so a record is never duplicated.
    pub async fn record(&self, snapshot: Snapshot) {
        let mut entries = self.entries.write().await;
        let snapshots = entries.entry(snapshot.host_id.clone()).or_default();
        snapshots.retain(|s| s.id != snapshot.id);
        snapshots.push(snapshot);
        Self::persist(&self.path, &entries);
    }

    /// Remove a snapshot after a confirmed destroy. Returns whether an entry
    /// was actually removed.
    pub async fn remove(&self, host_id: &str, snapshot_id: &str) -> bool {
        let mut entries = self.entries.write().await;
        let Some(snapshots) = entries.get_mut(host_id) else {
            return false;
        };
        let before = snapshots.len();
        snapshots.retain(|s| s.id != snapshot_id);
        let removed = snapshots.len() != before;
        if snapshots.is_empty() {
            entries.remove(host_id);
        }
        if removed {
            Self::persist(&self.path, &entries);
        }
        removed
    }

    /// Replace a host's entries wholesale (reconciliation after a provider
    /// list).
    pub async fn replace(&self, host_id: &str, snapshots: Vec<Snapshot>) {
        let mut entries = self.entries.write().await;
        if snapshots.is_empty() {
            entries.remove(host_id);
        } else {
            entries.insert(host_id.to_string(), snapshots);
        }
        Self::persist(&self.path, &entries);
    }

    /// Drop every entry for a host (host deregistered). Returns how many
    /// snapshots were dropped.
    pub async fn remove_host(&self, host_id: &str) -> usize {
        let mut entries = self.entries.write().await;
        let dropped = entries.remove(host_id).map(|v| v.len()).unwrap_or(0);
        if dropped > 0 {
            Self::persist(&self.path, &entries);
        }
        dropped
    }

    /// Persist to `snapshots.yaml` (atomic write via temp + rename).
    /// Persistence failures are logged, not surfaced — the in-memory view
    /// stays authoritative for this process.
    fn persist(path: &Path, entries: &HashMap<String, Vec<Snapshot>>) {
        let file = RegistryFile {
            hosts: entries.clone(),
        };
        let yaml = match serde_yaml::to_string(&file) {
            Ok(y) => y,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize snapshot registry");
                return;
            }
        };

        let tmp_path = path.with_extension("yaml.tmp");
        if let Err(e) = std::fs::write(&tmp_path, &yaml) {
            tracing::error!(path = %tmp_path.display(), error = %e, "failed to write registry temp file");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, path) {
            tracing::error!(error = %e, "failed to rename registry temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::snapshots::SnapshotStatus;

    fn snap(host_id: &str, id: &str) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            host_id: host_id.to_string(),
            name: format!("{id}-name"),
            description: String::new(),
            created_at: Utc::now(),
            status: SnapshotStatus::Ready,
        }
    }

    #[tokio::test]
    async fn record_list_remove_lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SnapshotRegistry::load(tmp.path().join("snapshots.yaml"));

        assert!(registry.list("h-1").await.is_empty());

        registry.record(snap("h-1", "snap-1")).await;
        registry.record(snap("h-1", "snap-2")).await;
        assert_eq!(registry.list("h-1").await.len(), 2);
        assert!(registry.get("h-1", "snap-1").await.is_some());

        assert!(registry.remove("h-1", "snap-1").await);
        assert!(!registry.remove("h-1", "snap-1").await);
        assert_eq!(registry.list("h-1").await.len(), 1);
    }

    #[tokio::test]
    async fn record_same_id_does_not_duplicate() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SnapshotRegistry::load(tmp.path().join("snapshots.yaml"));

        registry.record(snap("h-1", "snap-1")).await;
        let mut renamed = snap("h-1", "snap-1");
        renamed.name = "renamed".to_string();
        registry.record(renamed).await;

        let listed = registry.list("h-1").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "renamed");
    }

    #[tokio::test]
    async fn replace_reconciles_host_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SnapshotRegistry::load(tmp.path().join("snapshots.yaml"));

        registry.record(snap("h-1", "snap-1")).await;
        registry
            .replace("h-1", vec![snap("h-1", "snap-7"), snap("h-1", "snap-8")])
            .await;

        let ids: Vec<String> = registry.list("h-1").await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["snap-7", "snap-8"]);

        registry.replace("h-1", vec![]).await;
        assert!(registry.list("h-1").await.is_empty());
    }

    #[tokio::test]
    async fn remove_host_drops_all_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = SnapshotRegistry::load(tmp.path().join("snapshots.yaml"));

        registry.record(snap("h-1", "snap-1")).await;
        registry.record(snap("h-1", "snap-2")).await;
        registry.record(snap("h-2", "snap-3")).await;

        assert_eq!(registry.remove_host("h-1").await, 2);
        assert!(registry.list("h-1").await.is_empty());
        assert_eq!(registry.list("h-2").await.len(), 1);
    }

    #[tokio::test]
    async fn registry_persists_across_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("snapshots.yaml");

        {
            let registry = SnapshotRegistry::load(&path);
            registry.record(snap("h-1", "snap-1")).await;
        }

        let reloaded = SnapshotRegistry::load(&path);
        let listed = reloaded.list("h-1").await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "snap-1");
    }

    #[tokio::test]
    async fn garbage_registry_file_starts_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("snapshots.yaml");
        std::fs::write(&path, "{{{ not yaml").unwrap();

        let registry = SnapshotRegistry::load(&path);
        assert!(registry.list("h-1").await.is_empty());
    }
}
