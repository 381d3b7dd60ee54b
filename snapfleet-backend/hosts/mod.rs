pub mod file_repository;
pub mod repository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderKind;

/// A managed host in the fleet inventory — the "what" snapshots attach to.
/// Identity and role assignment for the actors operating on it live with the
/// fleet identity system; snapfleet only keeps the reference it needs to
/// address the virtualization backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    /// Which virtualization backend this host's VM lives on.
    pub backend: ProviderKind,
    /// Backend-side identifier for the VM (e.g. a vSphere MoRef like "vm-1042").
    pub machine_ref: String,
    pub created_at: DateTime<Utc>,
}

impl Host {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        backend: ProviderKind,
        machine_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            backend,
            machine_ref: machine_ref.into(),
            created_at: Utc::now(),
        }
    }
}
