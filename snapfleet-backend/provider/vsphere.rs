//! vSphere snapshot provider.
//!
//! Talks to a vSphere REST gateway that fronts vCenter's snapshot tasks.
//! The gateway addresses VMs by MoRef (the host's `machine_ref`) and blocks
//! until the underlying vCenter task completes, so every call here is
//! synchronous; the service layer bounds the wait with its own deadline.
//!
//! API: GET/POST /vms/{moref}/snapshots, PATCH/DELETE /vms/{moref}/snapshots/{id},
//! POST /vms/{moref}/snapshots/{id}/revert, GET /health

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hosts::Host;
use crate::snapshots::error::SnapshotError;
use crate::snapshots::{Snapshot, SnapshotStatus};

use super::{
    ComputeProvider, CreateSnapshotRequest, ProviderInfo, ProviderKind, UpdateSnapshotRequest,
};

// ── Request / Response types ────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct SnapshotCreateBody {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct SnapshotUpdateBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub state: String,
}

impl SnapshotResponse {
    fn into_snapshot(self, host: &Host) -> Snapshot {
        let status = match self.state.as_str() {
            "ready" => SnapshotStatus::Ready,
            "pending" => SnapshotStatus::Pending,
            _ => SnapshotStatus::Failed,
        };
        Snapshot {
            id: self.snapshot_id,
            host_id: host.id.clone(),
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotListResponse {
    pub snapshots: Vec<SnapshotResponse>,
    pub count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub vcenter: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// HTTP client for the vSphere gateway REST API.
#[derive(Debug, Clone)]
pub struct VsphereClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl VsphereClient {
    pub fn new(client: reqwest::Client, base_url: String, token: Option<String>) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            token,
            client,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Map a transport-level failure. Connection and timeout problems are the
    /// retryable kind; anything else is a plain backend error.
    fn transport_error(context: &str, e: reqwest::Error) -> SnapshotError {
        if e.is_connect() || e.is_timeout() {
            SnapshotError::Unavailable(format!("{context}: {e}"))
        } else {
            SnapshotError::Backend(format!("{context}: {e}"))
        }
    }

    /// Map a non-success HTTP status, draining the body for diagnostics.
    async fn status_error(context: &str, resp: reqwest::Response) -> SnapshotError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => SnapshotError::NotFound(format!("{context}: {body}")),
            501 => SnapshotError::Unsupported("backend lacks this snapshot capability"),
            502 | 503 | 504 => {
                SnapshotError::Unavailable(format!("{context} returned {status}: {body}"))
            }
            _ => SnapshotError::Backend(format!("{context} returned {status}: {body}")),
        }
    }

    /// Check gateway health.
    pub async fn health(&self) -> Result<HealthResponse, SnapshotError> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("health check", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("health check", resp).await);
        }

        resp.json::<HealthResponse>()
            .await
            .map_err(|e| SnapshotError::Serde(format!("failed to parse health response: {e}")))
    }

    pub async fn create_snapshot(
        &self,
        moref: &str,
        name: String,
        description: Option<String>,
    ) -> Result<SnapshotResponse, SnapshotError> {
        let url = format!("{}/vms/{}/snapshots", self.base_url, moref);

        tracing::info!(moref = %moref, name = %name, "creating snapshot via vSphere gateway");

        let resp = self
            .request(reqwest::Method::POST, &url)
            .json(&SnapshotCreateBody { name, description })
            .send()
            .await
            .map_err(|e| Self::transport_error("snapshot create", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("snapshot create", resp).await);
        }

        resp.json::<SnapshotResponse>()
            .await
            .map_err(|e| SnapshotError::Serde(format!("failed to parse snapshot response: {e}")))
    }

    pub async fn list_snapshots(
        &self,
        moref: &str,
    ) -> Result<SnapshotListResponse, SnapshotError> {
        let url = format!("{}/vms/{}/snapshots", self.base_url, moref);
        let resp = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("snapshot list", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("snapshot list", resp).await);
        }

        resp.json::<SnapshotListResponse>()
            .await
            .map_err(|e| SnapshotError::Serde(format!("failed to parse snapshot list: {e}")))
    }

    pub async fn update_snapshot(
        &self,
        moref: &str,
        snapshot_id: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<SnapshotResponse, SnapshotError> {
        let url = format!("{}/vms/{}/snapshots/{}", self.base_url, moref, snapshot_id);
        let resp = self
            .request(reqwest::Method::PATCH, &url)
            .json(&SnapshotUpdateBody { name, description })
            .send()
            .await
            .map_err(|e| Self::transport_error("snapshot update", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("snapshot update", resp).await);
        }

        resp.json::<SnapshotResponse>()
            .await
            .map_err(|e| SnapshotError::Serde(format!("failed to parse snapshot response: {e}")))
    }

    pub async fn revert_snapshot(
        &self,
        moref: &str,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        let url = format!(
            "{}/vms/{}/snapshots/{}/revert",
            self.base_url, moref, snapshot_id
        );

        tracing::info!(moref = %moref, snapshot_id = %snapshot_id, "reverting snapshot via vSphere gateway");

        let resp = self
            .request(reqwest::Method::POST, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("snapshot revert", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("snapshot revert", resp).await);
        }
        Ok(())
    }

    pub async fn delete_snapshot(
        &self,
        moref: &str,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        let url = format!("{}/vms/{}/snapshots/{}", self.base_url, moref, snapshot_id);

        tracing::info!(moref = %moref, snapshot_id = %snapshot_id, "deleting snapshot via vSphere gateway");

        let resp = self
            .request(reqwest::Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("snapshot delete", e))?;

        if !resp.status().is_success() {
            return Err(Self::status_error("snapshot delete", resp).await);
        }
        Ok(())
    }
}

// ── Provider ────────────────────────────────────────────────────────

pub struct VsphereProvider {
    client: VsphereClient,
}

impl VsphereProvider {
    pub fn new(client: VsphereClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ComputeProvider for VsphereProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            kind: ProviderKind::Vsphere,
            supports_revert: true,
            supports_update: true,
        }
    }

    async fn create_snapshot(
        &self,
        host: &Host,
        req: &CreateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        let name = req
            .name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", host.name, Utc::now().format("%Y%m%d-%H%M%S")));
        let resp = self
            .client
            .create_snapshot(&host.machine_ref, name, req.description.clone())
            .await?;
        Ok(resp.into_snapshot(host))
    }

    async fn list_snapshots(&self, host: &Host) -> Result<Vec<Snapshot>, SnapshotError> {
        let resp = self.client.list_snapshots(&host.machine_ref).await?;
        Ok(resp
            .snapshots
            .into_iter()
            .map(|s| s.into_snapshot(host))
            .collect())
    }

    async fn update_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
        req: &UpdateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        let resp = self
            .client
            .update_snapshot(
                &host.machine_ref,
                snapshot_id,
                req.name.clone(),
                req.description.clone(),
            )
            .await?;
        Ok(resp.into_snapshot(host))
    }

    async fn revert_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.client
            .revert_snapshot(&host.machine_ref, snapshot_id)
            .await
    }

    async fn destroy_snapshot(
        &self,
        host: &Host,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.client
            .delete_snapshot(&host.machine_ref, snapshot_id)
            .await
    }
}

// ── Tests ───────────────────────────────────────────────────────────
