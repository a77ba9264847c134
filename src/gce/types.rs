//! Compute Engine v1 wire representations.

use serde::{Deserialize, Serialize};

use crate::backend::{Disk, NewDisk, NewSnapshot, Quota, Snapshot, ZoneResource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DiskResource {
    name: String,
    #[serde(default)]
    self_link: String,
    #[serde(default, rename = "type")]
    disk_type: String,
    #[serde(default)]
    description: String,
}

impl From<DiskResource> for Disk {
    fn from(value: DiskResource) -> Self {
        Self {
            name: value.name,
            self_link: value.self_link,
            disk_type: value.disk_type,
            description: value.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SnapshotResource {
    name: String,
    #[serde(default)]
    self_link: String,
    #[serde(default)]
    description: String,
}

impl From<SnapshotResource> for Snapshot {
    fn from(value: SnapshotResource) -> Self {
        Self {
            name: value.name,
            self_link: value.self_link,
            description: value.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ZoneWire {
    name: String,
    #[serde(default)]
    self_link: String,
}

impl From<ZoneWire> for ZoneResource {
    fn from(value: ZoneWire) -> Self {
        Self {
            name: value.name,
            self_link: value.self_link,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProjectResource {
    #[serde(default)]
    pub(super) quotas: Vec<QuotaWire>,
}

#[derive(Debug, Deserialize)]
pub(super) struct QuotaWire {
    metric: String,
    #[serde(default)]
    limit: f64,
    #[serde(default)]
    usage: f64,
}

impl From<QuotaWire> for Quota {
    fn from(value: QuotaWire) -> Self {
        Self {
            metric: value.metric,
            usage: value.usage,
            limit: value.limit,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DiskInsert {
    name: String,
    source_snapshot: String,
    #[serde(rename = "type")]
    disk_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    replica_zones: Vec<String>,
}

impl From<&NewDisk> for DiskInsert {
    fn from(value: &NewDisk) -> Self {
        Self {
            name: value.name.clone(),
            source_snapshot: value.source_snapshot.clone(),
            disk_type: value.disk_type.clone(),
            description: value.description.clone(),
            replica_zones: value.replica_zones.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SnapshotInsert {
    name: String,
    source_disk: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    snapshot_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    storage_locations: Vec<String>,
}

impl From<&NewSnapshot> for SnapshotInsert {
    fn from(value: &NewSnapshot) -> Self {
        Self {
            name: value.name.clone(),
            source_disk: value.source_disk.clone(),
            description: value.description.clone(),
            snapshot_type: value.snapshot_type.as_str(),
            storage_locations: value.storage_locations.clone(),
        }
    }
}
