use std::io;

use crate::auth::Permission;

/// Errors from snapshot operations.
///
/// Providers should map their internal errors into these variants.
/// `Unsupported` is the expected return for capability-gated operations a
/// particular backend does not implement. `Unavailable` and `Timeout` are
/// the retryable kinds; retries are the caller's responsibility.
#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("actor {actor} lacks permission {permission}")]
    Unauthorized { actor: String, permission: Permission },

    #[error("host not found: {0}")]
    HostNotFound(String),

    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("another snapshot action is in flight for host {0}")]
    Conflict(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("provider call timed out")]
    Timeout,

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("serialization: {0}")]
    Serde(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl SnapshotError {
    /// Whether the caller can reasonably retry the same call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SnapshotError::Unavailable(_) | SnapshotError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_displays_actor_and_permission() {
        let err = SnapshotError::Unauthorized {
            actor: "bob".into(),
            permission: Permission::CreateSnapshots,
        };
        assert_eq!(err.to_string(), "actor bob lacks permission create_snapshots");
    }

    #[test]
    fn not_found_displays_id() {
        let err = SnapshotError::NotFound("snap-9".into());
        assert_eq!(err.to_string(), "snapshot not found: snap-9");
    }

    #[test]
    fn conflict_displays_host() {
        let err = SnapshotError::Conflict("h-1".into());
        assert!(err.to_string().contains("h-1"));
    }

    #[test]
    fn retryable_covers_unavailable_and_timeout_only() {
        assert!(SnapshotError::Unavailable("connection refused".into()).is_retryable());
        assert!(SnapshotError::Timeout.is_retryable());
        assert!(!SnapshotError::Unsupported("revert").is_retryable());
        assert!(!SnapshotError::HostNotFound("h-1".into()).is_retryable());
        assert!(
            !SnapshotError::Unauthorized {
                actor: "a".into(),
                permission: Permission::ViewSnapshots,
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file missing");
        let err: SnapshotError = io_err.into();
        assert!(err.to_string().contains("file missing"));
        assert!(matches!(err, SnapshotError::Io(_)));
    }

    #[test]
    fn error_is_send_and_sync() {
        // Required for use in async trait returns
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SnapshotError>();
    }
}
