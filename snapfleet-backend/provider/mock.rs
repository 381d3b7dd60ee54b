//! In-memory snapshot provider.
//!
//! Deterministic stand-in for a virtualization backend: sequential snapshot
//! ids, state keyed by the host's `machine_ref`. Tests use the injection
//! hooks (`fail_next`, `delay_next`) to script provider failures and slow
//! calls without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::hosts::Host;
use crate::snapshots::error::SnapshotError;
use crate::snapshots::{Snapshot, SnapshotStatus};

use super::{
    ComputeProvider, CreateSnapshotRequest, ProviderInfo, ProviderKind, UpdateSnapshotRequest,
};

#[derive(Default)]
pub struct MockProvider {
    /// machine_ref → snapshots, in creation order.
    snapshots: RwLock<HashMap<String, Vec<Snapshot>>>,
    next_id: AtomicU64,
    calls: AtomicU64,
    fail_next: Mutex<Option<SnapshotError>>,
    delay_next: Mutex<Option<Duration>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of provider operations attempted (including injected failures).
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next operation fail with the given error.
    pub async fn fail_next(&self, err: SnapshotError) {
        *self.fail_next.lock().await = Some(err);
    }

    /// Make the next operation sleep before doing its work.
    pub async fn delay_next(&self, delay: Duration) {
        *self.delay_next.lock().await = Some(delay);
    }

    /// Consume injected delay/failure, in that order.
    async fn gate(&self) -> Result<(), SnapshotError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_next.lock().await.take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.fail_next.lock().await.take() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            kind: ProviderKind::Mock,
            supports_revert: true,
            supports_update: true,
        }
    }

    async fn create_snapshot(
        &self,
        host: &Host,
        req: &CreateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        self.gate().await?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Snapshot {
            id: format!("snap-{n}"),
            host_id: host.id.clone(),
            name: req.name.clone().unwrap_or_else(|| format!("snapshot-{n}")),
            description: req.description.clone().unwrap_or_default(),
            created_at: Utc::now(),
            status: SnapshotStatus::Ready,
        };

        let mut map = self.snapshots.write().await;
        map.entry(host.machine_ref.clone())
            .or_default()
            .push(snapshot.clone());
        Ok(snapshot)
    }

    async fn list_snapshots(&self, host: &Host) -> Result<Vec<Snapshot>, SnapshotError> {
        self.gate().await?;
        let map = self.snapshots.read().await;
        Ok(map.get(&host.machine_ref).cloned().unwrap_or_default())
    }

    async fn update_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
        req: &UpdateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        self.gate().await?;
        let mut map = self.snapshots.write().await;
        let snapshots = map
            .get_mut(&host.machine_ref)
            .ok_or_else(|| SnapshotError::NotFound(snapshot_id.to_string()))?;
        let snapshot = snapshots
            .iter_mut()
            .find(|s| s.id == snapshot_id)
            .ok_or_else(|| SnapshotError::NotFound(snapshot_id.to_string()))?;
        if let Some(name) = &req.name {
            snapshot.name = name.clone();
        }
        if let Some(description) = &req.description {
            snapshot.description = description.clone();
        }
        Ok(snapshot.clone())
    }

    async fn revert_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.gate().await?;
        let map = self.snapshots.read().await;
        let exists = map
            .get(&host.machine_ref)
            .is_some_and(|snaps| snaps.iter().any(|s| s.id == snapshot_id));
        if !exists {
            return Err(SnapshotError::NotFound(snapshot_id.to_string()));
        }
        Ok(())
    }

    async fn destroy_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.gate().await?;
        let mut map = self.snapshots.write().await;
        let snapshots = map
            .get_mut(&host.machine_ref)
            .ok_or_else(|| SnapshotError::NotFound(snapshot_id.to_string()))?;
        let before = snapshots.len();
        snapshots.retain(|s| s.id != snapshot_id);
        if snapshots.len() == before {
            return Err(SnapshotError::NotFound(snapshot_id.to_string()));
        }
        Ok(())
    }
}
