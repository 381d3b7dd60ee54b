pub mod mock;
pub mod vsphere;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::hosts::Host;
use crate::snapshots::error::SnapshotError;
use crate::snapshots::Snapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Vsphere,
    Mock,
}

/// Metadata about a provider (backend kind, capability flags).
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub kind: ProviderKind,
    pub supports_revert: bool,
    pub supports_update: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSnapshotRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSnapshotRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Snapshot capability interface over a virtualization backend.
///
/// One provider instance per backend kind lives on `AppState`; which one is
/// chosen by configuration at startup. Operations a backend does not support
/// return `SnapshotError::Unsupported`.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Metadata about this provider (backend kind, capability flags).
    fn info(&self) -> ProviderInfo;

    /// Take a new snapshot of the host's VM. Returns the confirmed snapshot.
    async fn create_snapshot(
        &self,
        host: &Host,
        req: &CreateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError>;

    /// List the snapshots the backend currently holds for the host's VM.
    async fn list_snapshots(&self, host: &Host) -> Result<Vec<Snapshot>, SnapshotError>;

    /// Rename / re-describe an existing snapshot.
    async fn update_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
        req: &UpdateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError>;

    /// Roll the host's VM back to the given snapshot.
    async fn revert_snapshot(&self, host: &Host, snapshot_id: &str)
        -> Result<(), SnapshotError>;

    /// Delete the given snapshot on the backend.
    async fn destroy_snapshot(&self, host: &Host, snapshot_id: &str)
        -> Result<(), SnapshotError>;
}
