//! Availability-zone parsing for zonal and regional persistent disks.
//!
//! Kubernetes labels a regional disk with every zone it replicates to, joined
//! by [`ZONE_SEPARATOR`] (for example `us-central1-a__us-central1-b`). The
//! helpers here decide which Compute Engine API family a request belongs to
//! and derive the region from the first zone.

use std::fmt;

use thiserror::Error;

/// Separator used by GKE when a storage class spans several zones.
pub const ZONE_SEPARATOR: &str = "__";

/// Errors raised while interpreting an availability-zone tag.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ZoneError {
    /// Raised when the first zone does not have a `<prefix>-<suffix>-<letter>`
    /// shape.
    #[error("failed to parse region from zone: {zone:?}")]
    UnparseableRegion {
        /// The full availability-zone tag supplied by the caller.
        zone: String,
    },
}

/// Returns `true` when the tag names more than one zone.
#[must_use]
pub fn is_multi_zone(volume_az: &str) -> bool {
    volume_az.contains(ZONE_SEPARATOR)
}

/// Splits a tag into its constituent zone names.
pub fn zones(volume_az: &str) -> impl Iterator<Item = &str> {
    volume_az.split(ZONE_SEPARATOR)
}

/// Derives the region from the first zone of `volume_az`.
///
/// `us-central1-a__us-central1-b` and `us-central1-a` both yield
/// `us-central1`. Zones of a regional disk are assumed to share a region.
///
/// # Errors
///
/// Returns [`ZoneError::UnparseableRegion`] naming the whole tag when the first
/// zone has no dash-delimited region prefix.
pub fn parse_region(volume_az: &str) -> Result<String, ZoneError> {
    let first = zones(volume_az).next().unwrap_or_default();
    let mut parts = first.splitn(3, '-');
    match (parts.next(), parts.next()) {
        (Some(prefix), Some(suffix)) => Ok(format!("{prefix}-{suffix}")),
        _ => Err(ZoneError::UnparseableRegion {
            zone: volume_az.to_owned(),
        }),
    }
}

/// Where a disk lives: a single zone, or a region replicated across zones.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
    /// Disk addressed through the zonal API.
    Zonal {
        /// Zone name, for example `us-central1-a`.
        zone: String,
    },
    /// Disk addressed through the regional API.
    Regional {
        /// Region shared by every replica zone.
        region: String,
        /// Replica zones in tag order.
        zones: Vec<String>,
    },
}

impl Location {
    /// Classifies an availability-zone tag.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] when a multi-zone tag has no parseable region.
    pub fn parse(volume_az: &str) -> Result<Self, ZoneError> {
        if !is_multi_zone(volume_az) {
            return Ok(Self::Zonal {
                zone: volume_az.to_owned(),
            });
        }
        Ok(Self::Regional {
            region: parse_region(volume_az)?,
            zones: zones(volume_az).map(str::to_owned).collect(),
        })
    }

    /// Zone or region name used in API paths.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Zonal { zone } => zone,
            Self::Regional { region, .. } => region,
        }
    }

    /// Runs `zonal` or `regional` with the matching location name.
    ///
    /// Every disk operation has a zonal and a regional flavour; callers pass
    /// both and let the location pick.
    pub fn dispatch<'a, T>(
        &'a self,
        zonal: impl FnOnce(&'a str) -> T,
        regional: impl FnOnce(&'a str) -> T,
    ) -> T {
        match self {
            Self::Zonal { zone } => zonal(zone),
            Self::Regional { region, .. } => regional(region),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zonal { zone } => write!(formatter, "zone {zone}"),
            Self::Regional { region, .. } => write!(formatter, "region {region}"),
        }
    }
}
