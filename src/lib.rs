//! Compute Engine persistent-disk snapshots for Kubernetes backup tools.
//!
//! The crate exposes a [`ComputeBackend`] abstraction over the disk and
//! snapshot APIs, a REST implementation of it, and the
//! [`VolumeSnapshotter`] that a backup tool drives to snapshot, restore, and
//! relabel persistent volumes.

pub mod backend;
pub mod config;
pub mod gce;
pub mod naming;
pub mod snapshotter;
pub mod tags;
pub mod test_support;
pub mod volume_id;
pub mod zone;

pub use backend::{
    BackendFuture, ComputeBackend, Disk, NewDisk, NewSnapshot, ProviderError, Quota, Snapshot,
    ZoneResource,
};
pub use config::{ConfigError, SnapshotType, SnapshotterConfig, SnapshotterSettings};
pub use gce::{GceComputeBackend, GceError};
pub use snapshotter::{SnapshotterError, VolumeInfo, VolumeSnapshotter};
pub use tags::{Tags, merge_tags};
pub use volume_id::{CsiDriverSet, VolumeIdCodec, VolumeIdError, VolumeSource};
pub use zone::{Location, ZoneError};
