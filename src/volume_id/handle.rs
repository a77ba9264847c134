//! Structured view of a Compute Engine persistent-disk CSI handle.

use std::fmt;
use std::str::FromStr;

/// Whether a handle addresses a zonal or a regional disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HandleScope {
    /// `projects/{p}/zones/{zone}/disks/{name}`.
    Zones,
    /// `projects/{p}/regions/{region}/disks/{name}`.
    Regions,
}

impl HandleScope {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Zones => "zones",
            Self::Regions => "regions",
        }
    }
}

/// A parsed `projects/{project}/{zones|regions}/{location}/disks/{name}`
/// handle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiskHandle {
    /// Project that owns the disk.
    pub project: String,
    /// Zonal or regional addressing.
    pub scope: HandleScope,
    /// Zone or region name.
    pub location: String,
    /// Disk name; this is the volume ID.
    pub name: String,
}

/// Marker error for handles that do not match the fixed shape.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandleShapeError;

impl FromStr for DiskHandle {
    type Err = HandleShapeError;

    fn from_str(handle: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = handle.split('/').collect();
        let [projects, project, scope_segment, location, disks, name] = segments.as_slice() else {
            return Err(HandleShapeError);
        };
        if *projects != "projects" || *disks != "disks" {
            return Err(HandleShapeError);
        }
        let scope = match *scope_segment {
            "zones" => HandleScope::Zones,
            "regions" => HandleScope::Regions,
            _ => return Err(HandleShapeError),
        };
        if project.is_empty() || location.is_empty() || name.is_empty() {
            return Err(HandleShapeError);
        }
        Ok(Self {
            project: (*project).to_owned(),
            scope,
            location: (*location).to_owned(),
            name: (*name).to_owned(),
        })
    }
}

impl fmt::Display for DiskHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "projects/{}/{}/{}/disks/{}",
            self.project,
            self.scope.as_str(),
            self.location,
            self.name
        )
    }
}

/// Extracts the project segment without validating the rest of the handle.
///
/// Returns `None` when the handle has fewer than two `/`-delimited segments.
pub(super) fn project_segment(handle: &str) -> Option<&str> {
    handle.split('/').nth(1)
}
