//! Snapshot orchestration.
//!
//! Every action runs the same way: permission check, host lookup, take the
//! host's lock, call the provider under a deadline, and only then touch the
//! registry. Snapshot actions against one host are not commutative, so a
//! second action on a locked host is rejected with `Conflict` instead of
//! queued; actions on different hosts run independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::auth::gate::PermissionGate;
use crate::auth::Permission;
use crate::hosts::repository::HostRepository;
use crate::hosts::Host;
use crate::provider::{ComputeProvider, CreateSnapshotRequest, UpdateSnapshotRequest};

use super::error::SnapshotError;
use super::registry::SnapshotRegistry;
use super::Snapshot;

pub struct SnapshotService {
    provider: Arc<dyn ComputeProvider>,
    registry: Arc<SnapshotRegistry>,
    gate: Arc<PermissionGate>,
    hosts: Arc<dyn HostRepository>,
    /// One async mutex per host id. Entries are created on first use and
    /// never dropped; a fleet's host count is small.
    host_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    provider_timeout: Duration,
}

impl SnapshotService {
    pub fn new(
        provider: Arc<dyn ComputeProvider>,
        registry: Arc<SnapshotRegistry>,
        gate: Arc<PermissionGate>,
        hosts: Arc<dyn HostRepository>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            registry,
            gate,
            hosts,
            host_locks: Mutex::new(HashMap::new()),
            provider_timeout,
        }
    }

    pub fn registry(&self) -> &SnapshotRegistry {
        &self.registry
    }

    fn authorize(&self, actor: &str, permission: Permission) -> Result<(), SnapshotError> {
        if self.gate.check(actor, permission).is_allow() {
            return Ok(());
        }
        tracing::info!(actor = %actor, permission = %permission, "denied");
        Err(SnapshotError::Unauthorized {
            actor: actor.to_string(),
            permission,
        })
    }

    async fn host(&self, host_id: &str) -> Result<Host, SnapshotError> {
        self.hosts
            .get(host_id)
            .await
            .ok_or_else(|| SnapshotError::HostNotFound(host_id.to_string()))
    }

    /// Take the host's lock without waiting. A held lock means another
    /// snapshot action is in flight for this host.
    pub(crate) async fn lock_host(
        &self,
        host_id: &str,
    ) -> Result<OwnedMutexGuard<()>, SnapshotError> {
        let lock = {
            let mut locks = self.host_locks.lock().await;
            Arc::clone(locks.entry(host_id.to_string()).or_default())
        };
        lock.try_lock_owned()
            .map_err(|_| SnapshotError::Conflict(host_id.to_string()))
    }

    /// Bound a provider call. On expiry the in-flight call is dropped, the
    /// caller gets the retryable `Timeout`, and the host lock is released by
    /// the caller's guard going out of scope.
    async fn deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, SnapshotError>>,
    ) -> Result<T, SnapshotError> {
        match tokio::time::timeout(self.provider_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SnapshotError::Timeout),
        }
    }

    pub async fn create(
        &self,
        actor: &str,
        host_id: &str,
        req: &CreateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        self.authorize(actor, Permission::CreateSnapshots)?;
        let host = self.host(host_id).await?;
        let _guard = self.lock_host(host_id).await?;

        let snapshot = self.deadline(self.provider.create_snapshot(&host, req)).await?;
        self.registry.record(snapshot.clone()).await;

        tracing::info!(
            actor = %actor,
            host_id = %host_id,
            snapshot_id = %snapshot.id,
            "snapshot created"
        );
        Ok(snapshot)
    }

    /// List snapshots for a host, reconciling the registry with what the
    /// provider reports.
    pub async fn list(&self, actor: &str, host_id: &str) -> Result<Vec<Snapshot>, SnapshotError> {
        self.authorize(actor, Permission::ViewSnapshots)?;
        let host = self.host(host_id).await?;
        let _guard = self.lock_host(host_id).await?;

        let snapshots = self.deadline(self.provider.list_snapshots(&host)).await?;
        self.registry.replace(host_id, snapshots.clone()).await;
        Ok(snapshots)
    }

    /// Show a single snapshot from the registry. Reads don't contact the
    /// provider and don't take the host lock.
    pub async fn show(
        &self,
        actor: &str,
        host_id: &str,
        snapshot_id: &str,
    ) -> Result<Snapshot, SnapshotError> {
        self.authorize(actor, Permission::ViewSnapshots)?;
        self.host(host_id).await?;
        self.registry
            .get(host_id, snapshot_id)
            .await
            .ok_or_else(|| SnapshotError::NotFound(snapshot_id.to_string()))
    }

    pub async fn update(
        &self,
        actor: &str,
        host_id: &str,
        snapshot_id: &str,
        req: &UpdateSnapshotRequest,
    ) -> Result<Snapshot, SnapshotError> {
        self.authorize(actor, Permission::EditSnapshots)?;
        let host = self.host(host_id).await?;
        let _guard = self.lock_host(host_id).await?;

        let snapshot = self
            .deadline(self.provider.update_snapshot(&host, snapshot_id, req))
            .await?;
        self.registry.record(snapshot.clone()).await;

        tracing::info!(actor = %actor, host_id = %host_id, snapshot_id = %snapshot_id, "snapshot updated");
        Ok(snapshot)
    }

    pub async fn revert(
        &self,
        actor: &str,
        host_id: &str,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.authorize(actor, Permission::RevertSnapshots)?;
        let host = self.host(host_id).await?;
        let _guard = self.lock_host(host_id).await?;

        self.deadline(self.provider.revert_snapshot(&host, snapshot_id))
            .await?;

        tracing::info!(actor = %actor, host_id = %host_id, snapshot_id = %snapshot_id, "host reverted to snapshot");
        Ok(())
    }

    pub async fn destroy(
        &self,
        actor: &str,
        host_id: &str,
        snapshot_id: &str,
    ) -> Result<(), SnapshotError> {
        self.authorize(actor, Permission::DestroySnapshots)?;
        let host = self.host(host_id).await?;
        let _guard = self.lock_host(host_id).await?;

        self.deadline(self.provider.destroy_snapshot(&host, snapshot_id))
            .await?;
        self.registry.remove(host_id, snapshot_id).await;

        tracing::info!(actor = %actor, host_id = %host_id, snapshot_id = %snapshot_id, "snapshot destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as StdHashMap;

    use super::*;
    use crate::auth::{AuthConfig, SNAPSHOT_MANAGER, SNAPSHOT_VIEWER};
    use crate::hosts::file_repository::FileHostRepository;
    use crate::provider::mock::MockProvider;
    use crate::provider::ProviderKind;

    struct Fixture {
        provider: Arc<MockProvider>,
        service: SnapshotService,
        _tmp: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(30)).await
    }

    async fn fixture_with_timeout(provider_timeout: Duration) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();

        let provider = Arc::new(MockProvider::new());
        let registry = Arc::new(SnapshotRegistry::load(tmp.path().join("snapshots.yaml")));

        let mut assignments = StdHashMap::new();
        assignments.insert("viewer".to_string(), vec![SNAPSHOT_VIEWER.to_string()]);
        assignments.insert("manager".to_string(), vec![SNAPSHOT_MANAGER.to_string()]);
        let gate = Arc::new(PermissionGate::new(AuthConfig::from_parts(
            vec![],
            assignments,
        )));

        let hosts = Arc::new(FileHostRepository::new(tmp.path()));
        hosts.load_all().await.unwrap();
        hosts
            .save(Host::new("h-1", "web-01", ProviderKind::Mock, "mock-1"))
            .await
            .unwrap();
        hosts
            .save(Host::new("h-2", "db-01", ProviderKind::Mock, "mock-2"))
            .await
            .unwrap();

        let service = SnapshotService::new(
            provider.clone(),
            registry,
            gate,
            hosts,
            provider_timeout,
        );

        Fixture {
            provider,
            service,
            _tmp: tmp,
        }
    }

    #[tokio::test]
    async fn viewer_create_is_denied_before_provider_is_contacted() {
        let fx = fixture().await;

        let err = fx
            .service
            .create("viewer", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, SnapshotError::Unauthorized { .. }));
        assert_eq!(fx.provider.call_count(), 0);
        assert!(fx.service.registry().list("h-1").await.is_empty());
    }

    #[tokio::test]
    async fn anonymous_actor_is_denied_everything() {
        let fx = fixture().await;
        for result in [
            fx.service.list("", "h-1").await.map(|_| ()),
            fx.service
                .create("", "h-1", &CreateSnapshotRequest::default())
                .await
                .map(|_| ()),
            fx.service.revert("", "h-1", "snap-1").await,
            fx.service.destroy("", "h-1", "snap-1").await,
        ] {
            assert!(matches!(result, Err(SnapshotError::Unauthorized { .. })));
        }
        assert_eq!(fx.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn manager_create_records_exactly_once() {
        let fx = fixture().await;

        let snap = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        let listed = fx.service.list("manager", "h-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, snap.id);

        let registered = fx.service.registry().list("h-1").await;
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, snap.id);
    }

    #[tokio::test]
    async fn unknown_host_fails_before_provider_is_contacted() {
        let fx = fixture().await;
        let err = fx
            .service
            .create("manager", "h-404", &CreateSnapshotRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::HostNotFound(_)));
        assert_eq!(fx.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn destroy_removes_registry_entry_only_on_provider_success() {
        let fx = fixture().await;
        let snap = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        // Provider failure: registry keeps the entry
        fx.provider
            .fail_next(SnapshotError::Unavailable("gateway down".into()))
            .await;
        let err = fx.service.destroy("manager", "h-1", &snap.id).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(fx.service.registry().list("h-1").await.len(), 1);

        // Provider success: entry removed
        fx.service.destroy("manager", "h-1", &snap.id).await.unwrap();
        assert!(fx.service.registry().list("h-1").await.is_empty());
    }

    #[tokio::test]
    async fn update_renames_in_registry() {
        let fx = fixture().await;
        let snap = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        fx.service
            .update(
                "manager",
                "h-1",
                &snap.id,
                &UpdateSnapshotRequest {
                    name: Some("pre-upgrade".into()),
                    description: None,
                },
            )
            .await
            .unwrap();

        let registered = fx.service.registry().list("h-1").await;
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].name, "pre-upgrade");
    }

    #[tokio::test]
    async fn show_reads_registry_and_maps_missing_to_not_found() {
        let fx = fixture().await;
        let snap = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        let shown = fx.service.show("viewer", "h-1", &snap.id).await.unwrap();
        assert_eq!(shown.id, snap.id);

        let err = fx.service.show("viewer", "h-1", "snap-404").await.unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[tokio::test]
    async fn held_host_lock_rejects_second_action() {
        let fx = fixture().await;
        let _guard = fx.service.lock_host("h-1").await.unwrap();

        let err = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Conflict(_)));
        assert_eq!(fx.provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_actions_on_one_host_do_not_interleave() {
        let fx = fixture().await;
        let service = Arc::new(fx.service);

        // First create parks inside the provider call while holding the lock
        fx.provider.delay_next(Duration::from_secs(5)).await;
        let first = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .create("manager", "h-1", &CreateSnapshotRequest::default())
                    .await
            })
        };
        tokio::task::yield_now().await;

        // Second action on the same host is rejected, not queued
        let err = service
            .destroy("manager", "h-1", "snap-1")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Conflict(_)));

        // The first action completes untouched
        let snap = first.await.unwrap().unwrap();
        let registered = service.registry().list("h-1").await;
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].id, snap.id);
    }

    #[tokio::test]
    async fn actions_on_different_hosts_run_independently() {
        let fx = fixture().await;
        let _guard = fx.service.lock_host("h-1").await.unwrap();

        let snap = fx
            .service
            .create("manager", "h-2", &CreateSnapshotRequest::default())
            .await
            .unwrap();
        assert_eq!(snap.host_id, "h-2");
        assert_eq!(fx.service.registry().list("h-2").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_leaves_registry_unchanged_and_releases_lock() {
        let fx = fixture_with_timeout(Duration::from_secs(1)).await;
        let snap = fx
            .service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        fx.provider.delay_next(Duration::from_secs(60)).await;
        let err = fx.service.revert("manager", "h-1", &snap.id).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Timeout));
        assert!(err.is_retryable());

        // Registry entry untouched
        assert_eq!(fx.service.registry().list("h-1").await.len(), 1);

        // Lock was released on timeout: the next action proceeds
        fx.service.revert("manager", "h-1", &snap.id).await.unwrap();
    }

    #[tokio::test]
    async fn viewer_can_list_but_registry_stays_consistent() {
        let fx = fixture().await;
        fx.service
            .create("manager", "h-1", &CreateSnapshotRequest::default())
            .await
            .unwrap();

        let listed = fx.service.list("viewer", "h-1").await.unwrap();
        assert_eq!(listed.len(), 1);

        // Reconciliation: provider-side destroy shows up after the next list
        let host = Host::new("h-1", "web-01", ProviderKind::Mock, "mock-1");
        fx.provider.destroy_snapshot(&host, &listed[0].id).await.unwrap();
        let listed = fx.service.list("viewer", "h-1").await.unwrap();
        assert!(listed.is_empty());
        assert!(fx.service.registry().list("h-1").await.is_empty());
    }
}
