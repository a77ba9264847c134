//! Reading and rewriting disk identities embedded in Kubernetes persistent
//! volumes.
//!
//! A persistent volume names its Compute Engine disk either through a CSI
//! block (`spec.csi.volumeHandle`, a full disk resource path) or through the
//! legacy in-tree block (`spec.gcePersistentDisk.pdName`, a bare disk name).
//! The volume arrives as an unstructured JSON document so fields this crate
//! does not understand survive a rewrite untouched.

mod handle;

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

pub use handle::{DiskHandle, HandleScope, HandleShapeError};

/// CSI driver name used by the GKE persistent-disk driver.
pub const PD_CSI_DRIVER: &str = "pd.csi.storage.gke.io";

/// CSI driver name used by confidential GKE nodes.
pub const CONFIDENTIAL_CSI_DRIVER: &str = "gcp.csi.confidential.cloud";

/// Errors raised while reading or rewriting a volume identity.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeIdError {
    /// Raised when a supported CSI driver carries a handle off the fixed shape.
    #[error(
        "invalid volumeHandle for CSI driver {driver}: expected projects/{{project}}/zones/{{zone}}/disks/{{name}}, got {handle}"
    )]
    InvalidHandle {
        /// CSI driver named by the volume.
        driver: String,
        /// Offending handle.
        handle: String,
    },
    /// Raised when a rewrite targets a CSI driver outside the supported set.
    #[error("unable to handle CSI driver: {driver}")]
    UnsupportedDriver {
        /// CSI driver named by the volume.
        driver: String,
    },
    /// Raised when the in-tree block has no disk name.
    #[error("spec.gcePersistentDisk.pdName not found")]
    MissingDiskName,
    /// Raised when a rewrite finds neither a CSI nor an in-tree block.
    #[error("spec.csi and spec.gcePersistentDisk not found")]
    MissingVolumeSource,
    /// Raised when the document does not have the persistent-volume shape.
    #[error("persistent volume could not be decoded: {0}")]
    Malformed(String),
}

/// CSI drivers whose handles this crate knows how to interpret.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CsiDriverSet {
    drivers: BTreeSet<String>,
}

impl CsiDriverSet {
    /// Builds a set from explicit driver names.
    pub fn new(drivers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            drivers: drivers.into_iter().map(Into::into).collect(),
        }
    }

    /// Adds another recognised driver.
    #[must_use]
    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.drivers.insert(driver.into());
        self
    }

    /// Returns `true` when `driver` is recognised.
    #[must_use]
    pub fn contains(&self, driver: &str) -> bool {
        self.drivers.contains(driver)
    }

    /// Iterates the recognised driver names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(String::as_str)
    }
}

impl Default for CsiDriverSet {
    fn default() -> Self {
        Self::new([PD_CSI_DRIVER, CONFIDENTIAL_CSI_DRIVER])
    }
}

/// The volume source a persistent volume declares.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VolumeSource {
    /// CSI block owned by a recognised driver.
    Csi {
        /// Driver name.
        driver: String,
        /// Raw, not yet validated handle.
        handle: String,
    },
    /// CSI block owned by some other driver.
    UnsupportedCsi {
        /// Driver name.
        driver: String,
    },
    /// Legacy in-tree block.
    GcePersistentDisk {
        /// Disk name, possibly empty.
        pd_name: String,
    },
    /// Neither block is present.
    Absent,
}

#[derive(Deserialize)]
struct PersistentVolumeView {
    #[serde(default)]
    spec: Option<SpecView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpecView {
    #[serde(default)]
    csi: Option<CsiView>,
    #[serde(default)]
    gce_persistent_disk: Option<GcePersistentDiskView>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsiView {
    #[serde(default)]
    driver: String,
    #[serde(default)]
    volume_handle: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcePersistentDiskView {
    #[serde(default)]
    pd_name: String,
}

impl VolumeSource {
    /// Classifies the source of `pv`. A CSI block takes precedence over an
    /// in-tree block.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeIdError::Malformed`] when `pv` does not decode as a
    /// persistent volume.
    pub fn classify(pv: &Value, drivers: &CsiDriverSet) -> Result<Self, VolumeIdError> {
        let view = PersistentVolumeView::deserialize(pv)
            .map_err(|err| VolumeIdError::Malformed(err.to_string()))?;
        let Some(spec) = view.spec else {
            return Ok(Self::Absent);
        };
        if let Some(csi) = spec.csi {
            if drivers.contains(&csi.driver) {
                return Ok(Self::Csi {
                    driver: csi.driver,
                    handle: csi.volume_handle,
                });
            }
            return Ok(Self::UnsupportedCsi { driver: csi.driver });
        }
        Ok(spec
            .gce_persistent_disk
            .map_or(Self::Absent, |disk| Self::GcePersistentDisk {
                pd_name: disk.pd_name,
            }))
    }
}

/// Reads and rewrites disk identities for one volume project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VolumeIdCodec {
    drivers: CsiDriverSet,
    volume_project: String,
}

impl VolumeIdCodec {
    /// Creates a codec recognising `drivers` and rewriting cross-project
    /// handles into `volume_project`.
    pub fn new(drivers: CsiDriverSet, volume_project: impl Into<String>) -> Self {
        Self {
            drivers,
            volume_project: volume_project.into(),
        }
    }

    /// Recognised CSI drivers.
    #[must_use]
    pub const fn drivers(&self) -> &CsiDriverSet {
        &self.drivers
    }

    /// Returns the disk name the volume points at.
    ///
    /// `Ok(None)` means there is nothing for this provider to snapshot: the
    /// volume has no source block, or its CSI driver is not recognised.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeIdError::InvalidHandle`] for a malformed handle of a
    /// recognised driver, [`VolumeIdError::MissingDiskName`] for an in-tree
    /// block with an empty name, and [`VolumeIdError::Malformed`] when `pv`
    /// cannot be decoded.
    pub fn get_volume_id(&self, pv: &Value) -> Result<Option<String>, VolumeIdError> {
        match VolumeSource::classify(pv, &self.drivers)? {
            VolumeSource::Csi { driver, handle } => {
                let parsed = parse_handle(&driver, &handle)?;
                Ok(Some(parsed.name))
            }
            VolumeSource::UnsupportedCsi { driver } => {
                info!(%driver, "skipping volume provisioned by unsupported CSI driver");
                Ok(None)
            }
            VolumeSource::GcePersistentDisk { pd_name } if pd_name.is_empty() => {
                Err(VolumeIdError::MissingDiskName)
            }
            VolumeSource::GcePersistentDisk { pd_name } => Ok(Some(pd_name)),
            VolumeSource::Absent => Ok(None),
        }
    }

    /// Returns a copy of `pv` pointing at `volume_id`.
    ///
    /// CSI handles keep their location; a handle from another project is
    /// moved into the codec's volume project since that is where restored
    /// disks are created.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeIdError::UnsupportedDriver`] for an unrecognised CSI
    /// driver, [`VolumeIdError::InvalidHandle`] for a malformed handle,
    /// [`VolumeIdError::MissingVolumeSource`] when no source block exists, and
    /// [`VolumeIdError::Malformed`] when `pv` cannot be decoded.
    pub fn set_volume_id(&self, pv: &Value, volume_id: &str) -> Result<Value, VolumeIdError> {
        match VolumeSource::classify(pv, &self.drivers)? {
            VolumeSource::Csi { driver, handle } => {
                let mut parsed = parse_handle(&driver, &handle)?;
                if self.is_created_cross_project(&handle) {
                    parsed.project.clone_from(&self.volume_project);
                }
                parsed.name = volume_id.to_owned();
                write_field(pv, "csi", "volumeHandle", parsed.to_string())
            }
            VolumeSource::UnsupportedCsi { driver } => {
                Err(VolumeIdError::UnsupportedDriver { driver })
            }
            VolumeSource::GcePersistentDisk { .. } => {
                write_field(pv, "gcePersistentDisk", "pdName", volume_id.to_owned())
            }
            VolumeSource::Absent => Err(VolumeIdError::MissingVolumeSource),
        }
    }

    /// Returns `true` when the handle's project differs from the volume
    /// project. Handles with fewer than two segments are never cross-project.
    #[must_use]
    pub fn is_created_cross_project(&self, volume_handle: &str) -> bool {
        handle::project_segment(volume_handle).is_some_and(|project| project != self.volume_project)
    }
}

fn parse_handle(driver: &str, handle: &str) -> Result<DiskHandle, VolumeIdError> {
    handle
        .parse::<DiskHandle>()
        .map_err(|HandleShapeError| VolumeIdError::InvalidHandle {
            driver: driver.to_owned(),
            handle: handle.to_owned(),
        })
}

fn write_field(pv: &Value, block: &str, field: &str, value: String) -> Result<Value, VolumeIdError> {
    let mut updated = pv.clone();
    let object = updated
        .pointer_mut(&format!("/spec/{block}"))
        .and_then(Value::as_object_mut)
        .ok_or_else(|| VolumeIdError::Malformed(format!("spec.{block} is not an object")))?;
    object.insert(field.to_owned(), Value::String(value));
    Ok(updated)
}

#[cfg(test)]
mod tests;
