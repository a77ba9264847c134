//! Backend abstraction over the Compute Engine disk and snapshot APIs.

use std::future::Future;
use std::pin::Pin;

use crate::config::SnapshotType;

/// Quota metric that caps the number of snapshots in a project.
pub const SNAPSHOTS_QUOTA_METRIC: &str = "SNAPSHOTS";

/// A persistent disk as reported by the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Disk {
    /// Disk name.
    pub name: String,
    /// Canonical resource URL.
    pub self_link: String,
    /// Disk type URL (for example `.../diskTypes/pd-ssd`).
    pub disk_type: String,
    /// Free-form description; Kubernetes stores tag JSON here.
    pub description: String,
}

/// A snapshot as reported by the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    /// Snapshot name.
    pub name: String,
    /// Canonical resource URL.
    pub self_link: String,
    /// Free-form description carrying the tag JSON.
    pub description: String,
}

/// A zone as reported by the provider.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ZoneResource {
    /// Zone name.
    pub name: String,
    /// Canonical resource URL, used as a replica locator.
    pub self_link: String,
}

/// Usage and limit of one project quota metric.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Quota {
    /// Metric name, for example `SNAPSHOTS`.
    pub metric: String,
    /// Current usage.
    pub usage: f64,
    /// Enforced limit.
    pub limit: f64,
}

impl Quota {
    /// Returns `true` when no further resource of this kind can be created.
    ///
    /// Usage above the limit counts as exhausted, as happens once a limit is
    /// lowered below current usage.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.usage >= self.limit
    }
}

/// Parameters for a new disk restored from a snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewDisk {
    /// Disk name.
    pub name: String,
    /// Resource URL of the source snapshot.
    pub source_snapshot: String,
    /// Disk type URL.
    pub disk_type: String,
    /// Description copied from the snapshot.
    pub description: String,
    /// Zone URLs of the replicas; empty for zonal disks.
    pub replica_zones: Vec<String>,
}

impl NewDisk {
    /// Describes a disk restored from `snapshot`, inheriting its description.
    #[must_use]
    pub fn from_snapshot(
        name: impl Into<String>,
        snapshot: &Snapshot,
        disk_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_snapshot: snapshot.self_link.clone(),
            disk_type: disk_type.into(),
            description: snapshot.description.clone(),
            replica_zones: Vec::new(),
        }
    }

    /// Sets the replica zone URLs of a regional disk.
    #[must_use]
    pub fn replica_zones(mut self, zone_urls: Vec<String>) -> Self {
        self.replica_zones = zone_urls;
        self
    }
}

/// Parameters for a new snapshot of an existing disk.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NewSnapshot {
    /// Snapshot name.
    pub name: String,
    /// Resource URL of the source disk.
    pub source_disk: String,
    /// Tag JSON, or empty.
    pub description: String,
    /// Snapshot class.
    pub snapshot_type: SnapshotType,
    /// Storage locations; empty lets the provider choose.
    pub storage_locations: Vec<String>,
}

/// Provider errors must say whether the addressed resource was absent.
pub trait ProviderError: std::error::Error + Send + Sync + 'static {
    /// Returns `true` for a "resource not found" response.
    fn is_not_found(&self) -> bool;
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Compute Engine operations the snapshot lifecycle depends on.
///
/// Each call is a single request/response. Implementations must not retry.
pub trait ComputeBackend {
    /// Provider specific error type returned by the backend.
    type Error: ProviderError;

    /// Reads a snapshot.
    fn get_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error>;

    /// Creates a snapshot.
    fn insert_snapshot<'a>(
        &'a self,
        project: &'a str,
        snapshot: &'a NewSnapshot,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Deletes a snapshot.
    fn delete_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Reads a zonal disk.
    fn get_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error>;

    /// Reads a regional disk.
    fn get_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error>;

    /// Creates a zonal disk.
    fn insert_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Creates a regional disk.
    fn insert_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error>;

    /// Reads a zone.
    fn get_zone<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, ZoneResource, Self::Error>;

    /// Reads the project's quotas.
    fn project_quotas<'a>(&'a self, project: &'a str) -> BackendFuture<'a, Vec<Quota>, Self::Error>;
}
