//! Error types for the snapshot lifecycle.

use thiserror::Error;

use crate::volume_id::VolumeIdError;
use crate::zone::ZoneError;

/// Errors raised by [`super::VolumeSnapshotter`] operations.
#[derive(Debug, Error)]
pub enum SnapshotterError<BackendError>
where
    BackendError: std::error::Error + 'static,
{
    /// Raised when the availability-zone tag cannot be interpreted.
    #[error(transparent)]
    Zone(#[from] ZoneError),
    /// Raised when a persistent volume identity cannot be read or rewritten.
    #[error(transparent)]
    VolumeId(#[from] VolumeIdError),
    /// Raised when the snapshots quota leaves no room for another snapshot.
    #[error("snapshots quota for project {project} has been reached ({usage}/{limit})")]
    QuotaExceeded {
        /// Project whose quota is exhausted.
        project: String,
        /// Reported usage.
        usage: f64,
        /// Reported limit.
        limit: f64,
    },
    /// Raised when the source snapshot cannot be read.
    #[error("failed to get snapshot {snapshot} in project {project}: {source}")]
    GetSnapshot {
        /// Snapshot project.
        project: String,
        /// Snapshot name.
        snapshot: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when a disk cannot be read.
    #[error("failed to get disk {disk} in {location}: {source}")]
    GetDisk {
        /// Disk name.
        disk: String,
        /// Zone or region, rendered for humans.
        location: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when a replica zone cannot be resolved to its URL.
    #[error("failed to get zone {zone}: {source}")]
    GetZone {
        /// Zone name.
        zone: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when a restored disk cannot be created.
    #[error("failed to create disk {disk} in {location}: {source}")]
    InsertDisk {
        /// Disk name.
        disk: String,
        /// Zone or region, rendered for humans.
        location: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when project quotas cannot be read.
    #[error("failed to read quotas for project {project}: {source}")]
    GetQuotas {
        /// Project whose quotas were requested.
        project: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when a snapshot cannot be created.
    #[error("failed to create snapshot {snapshot} of disk {disk}: {source}")]
    InsertSnapshot {
        /// Snapshot name.
        snapshot: String,
        /// Source disk name.
        disk: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
    /// Raised when a snapshot cannot be deleted for a reason other than it
    /// being absent.
    #[error("failed to delete snapshot {snapshot}: {source}")]
    DeleteSnapshot {
        /// Snapshot name.
        snapshot: String,
        /// Provider-specific error.
        #[source]
        source: BackendError,
    },
}
