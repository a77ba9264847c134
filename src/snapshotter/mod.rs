//! Snapshot lifecycle orchestration for Compute Engine persistent disks.
//!
//! [`VolumeSnapshotter`] is what a backup tool drives: it snapshots disks,
//! restores disks from snapshots, deletes snapshots, and reads or rewrites the
//! disk identity stored in a persistent volume. Every operation is a short,
//! independent sequence of provider calls; nothing is cached between calls.

mod error;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{
    ComputeBackend, Disk, NewDisk, NewSnapshot, ProviderError, SNAPSHOTS_QUOTA_METRIC,
};
use crate::config::SnapshotterSettings;
use crate::naming::{restored_disk_name, snapshot_name};
use crate::tags::{Tags, merge_tags};
use crate::volume_id::{VolumeIdCodec, VolumeIdError};
use crate::zone::Location;

pub use error::SnapshotterError;

/// Type and provisioned IOPS of an existing disk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeInfo {
    /// Disk type URL.
    pub volume_type: String,
    /// Provisioned IOPS; Compute Engine does not report one.
    pub iops: Option<i64>,
}

/// Coordinates disk and snapshot operations against a [`ComputeBackend`].
#[derive(Debug)]
pub struct VolumeSnapshotter<B> {
    backend: B,
    settings: SnapshotterSettings,
    codec: VolumeIdCodec,
}

type Result<T, B> = std::result::Result<T, SnapshotterError<<B as ComputeBackend>::Error>>;

impl<B: ComputeBackend> VolumeSnapshotter<B> {
    /// Creates a snapshotter with settings fixed for its lifetime.
    #[must_use]
    pub fn new(backend: B, settings: SnapshotterSettings) -> Self {
        let codec = VolumeIdCodec::new(settings.drivers.clone(), settings.volume_project.clone());
        Self {
            backend,
            settings,
            codec,
        }
    }

    /// Settings this snapshotter was built with.
    #[must_use]
    pub const fn settings(&self) -> &SnapshotterSettings {
        &self.settings
    }

    /// Creates a disk from `snapshot_id` and returns the new disk's name.
    ///
    /// A multi-zone `volume_az` produces a regional disk replicated to every
    /// listed zone. The snapshot's description, which carries the tags, is
    /// copied onto the disk. `_iops` is accepted for interface parity; Compute
    /// Engine disks have no provisioned-IOPS setting here.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotterError`] when the zone tag is malformed or any
    /// provider call fails.
    pub async fn create_volume_from_snapshot(
        &self,
        snapshot_id: &str,
        volume_type: &str,
        volume_az: &str,
        _iops: Option<i64>,
    ) -> Result<String, B> {
        let location = Location::parse(volume_az)?;
        let project = self.settings.snapshot_project.as_str();

        debug!(%project, snapshot = %snapshot_id, "reading source snapshot");
        let snapshot = self
            .backend
            .get_snapshot(project, snapshot_id)
            .await
            .map_err(|source| SnapshotterError::GetSnapshot {
                project: project.to_owned(),
                snapshot: snapshot_id.to_owned(),
                source,
            })?;

        let mut disk =
            NewDisk::from_snapshot(restored_disk_name(Uuid::new_v4()), &snapshot, volume_type);
        if let Location::Regional { zones, .. } = &location {
            disk = disk.replica_zones(self.zone_urls(zones).await?);
        }

        let volume_project = self.settings.volume_project.as_str();
        debug!(disk = %disk.name, %location, "creating disk from snapshot");
        location
            .dispatch(
                |zone| self.backend.insert_disk(volume_project, zone, &disk),
                |region| self.backend.insert_region_disk(volume_project, region, &disk),
            )
            .await
            .map_err(|source| SnapshotterError::InsertDisk {
                disk: disk.name.clone(),
                location: location.to_string(),
                source,
            })?;

        info!(disk = %disk.name, snapshot = %snapshot_id, "restored disk from snapshot");
        Ok(disk.name)
    }

    /// Returns the type of an existing disk.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotterError`] when the zone tag is malformed or the disk
    /// cannot be read.
    pub async fn get_volume_info(&self, volume_id: &str, volume_az: &str) -> Result<VolumeInfo, B> {
        let location = Location::parse(volume_az)?;
        let disk = self.get_disk(&location, volume_id).await?;
        Ok(VolumeInfo {
            volume_type: disk.disk_type,
            iops: None,
        })
    }

    /// Snapshots `volume_id` and returns the snapshot's name.
    ///
    /// The project's `SNAPSHOTS` quota is checked first; when it is exhausted
    /// no snapshot is attempted. The snapshot description merges the disk's
    /// existing tags with `tags`, the latter winning on collision.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotterError::QuotaExceeded`] when the quota is used up,
    /// and other [`SnapshotterError`] variants when the zone tag is malformed
    /// or a provider call fails.
    pub async fn create_snapshot(
        &self,
        volume_id: &str,
        volume_az: &str,
        tags: &Tags,
    ) -> Result<String, B> {
        self.ensure_snapshot_quota().await?;

        let name = snapshot_name(volume_id, Uuid::new_v4());
        let location = Location::parse(volume_az)?;
        let disk = self.get_disk(&location, volume_id).await?;

        let snapshot = NewSnapshot {
            name,
            source_disk: disk.self_link,
            description: merge_tags(tags, &disk.description),
            snapshot_type: self.settings.snapshot_type,
            storage_locations: self.settings.snapshot_location.iter().cloned().collect(),
        };

        let project = self.settings.snapshot_project.as_str();
        debug!(snapshot = %snapshot.name, disk = %volume_id, %project, "creating snapshot");
        self.backend
            .insert_snapshot(project, &snapshot)
            .await
            .map_err(|source| SnapshotterError::InsertSnapshot {
                snapshot: snapshot.name.clone(),
                disk: volume_id.to_owned(),
                source,
            })?;

        info!(snapshot = %snapshot.name, disk = %volume_id, "created snapshot");
        Ok(snapshot.name)
    }

    /// Deletes a snapshot. A snapshot that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotterError::DeleteSnapshot`] for any provider failure
    /// other than "not found".
    pub async fn delete_snapshot(&self, snapshot_id: &str) -> Result<(), B> {
        let project = self.settings.snapshot_project.as_str();
        match self.backend.delete_snapshot(project, snapshot_id).await {
            Ok(()) => {
                info!(snapshot = %snapshot_id, "deleted snapshot");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(snapshot = %snapshot_id, "snapshot already absent");
                Ok(())
            }
            Err(source) => Err(SnapshotterError::DeleteSnapshot {
                snapshot: snapshot_id.to_owned(),
                source,
            }),
        }
    }

    /// Reads the disk name a persistent volume points at.
    ///
    /// # Errors
    ///
    /// See [`VolumeIdCodec::get_volume_id`].
    pub fn get_volume_id(&self, pv: &Value) -> std::result::Result<Option<String>, VolumeIdError> {
        self.codec.get_volume_id(pv)
    }

    /// Returns a copy of a persistent volume pointing at `volume_id`.
    ///
    /// # Errors
    ///
    /// See [`VolumeIdCodec::set_volume_id`].
    pub fn set_volume_id(
        &self,
        pv: &Value,
        volume_id: &str,
    ) -> std::result::Result<Value, VolumeIdError> {
        self.codec.set_volume_id(pv, volume_id)
    }

    /// Returns `true` when `volume_handle` names a project other than the
    /// volume project.
    #[must_use]
    pub fn is_volume_created_cross_projects(&self, volume_handle: &str) -> bool {
        self.codec.is_created_cross_project(volume_handle)
    }

    async fn ensure_snapshot_quota(&self) -> Result<(), B> {
        let project = self.settings.volume_project.as_str();
        let quotas = self
            .backend
            .project_quotas(project)
            .await
            .map_err(|source| SnapshotterError::GetQuotas {
                project: project.to_owned(),
                source,
            })?;

        match quotas
            .iter()
            .find(|quota| quota.metric == SNAPSHOTS_QUOTA_METRIC)
        {
            Some(quota) if quota.is_exhausted() => Err(SnapshotterError::QuotaExceeded {
                project: project.to_owned(),
                usage: quota.usage,
                limit: quota.limit,
            }),
            _ => Ok(()),
        }
    }

    async fn get_disk(&self, location: &Location, volume_id: &str) -> Result<Disk, B> {
        let project = self.settings.volume_project.as_str();
        location
            .dispatch(
                |zone| self.backend.get_disk(project, zone, volume_id),
                |region| self.backend.get_region_disk(project, region, volume_id),
            )
            .await
            .map_err(|source| SnapshotterError::GetDisk {
                disk: volume_id.to_owned(),
                location: location.to_string(),
                source,
            })
    }

    async fn zone_urls(&self, zones: &[String]) -> Result<Vec<String>, B> {
        let project = self.settings.volume_project.as_str();
        let mut urls = Vec::with_capacity(zones.len());
        for zone in zones {
            let resource = self
                .backend
                .get_zone(project, zone)
                .await
                .map_err(|source| SnapshotterError::GetZone {
                    zone: zone.clone(),
                    source,
                })?;
            urls.push(resource.self_link);
        }
        Ok(urls)
    }
}
