pub mod error;
pub mod registry;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time saved state of a host's VM, as tracked locally.
///
/// The registry only ever holds snapshots the provider has confirmed, so a
/// `Pending` status here means the backend reported the snapshot task as
/// still running when we last listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub host_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: SnapshotStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotStatus {
    Pending,
    Ready,
    Failed,
}
