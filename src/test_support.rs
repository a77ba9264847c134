//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::backend::{
    BackendFuture, ComputeBackend, Disk, NewDisk, NewSnapshot, ProviderError, Quota, Snapshot,
    ZoneResource,
};

/// Base URL used for self links minted by [`FakeCompute`].
pub const FAKE_API_BASE: &str = "https://compute.example.test/compute/v1";

/// Backend operations [`FakeCompute`] can be told to fail.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum FakeOperation {
    /// [`ComputeBackend::get_snapshot`].
    GetSnapshot,
    /// [`ComputeBackend::insert_snapshot`].
    InsertSnapshot,
    /// [`ComputeBackend::delete_snapshot`].
    DeleteSnapshot,
    /// [`ComputeBackend::get_disk`].
    GetDisk,
    /// [`ComputeBackend::get_region_disk`].
    GetRegionDisk,
    /// [`ComputeBackend::insert_disk`].
    InsertDisk,
    /// [`ComputeBackend::insert_region_disk`].
    InsertRegionDisk,
    /// [`ComputeBackend::get_zone`].
    GetZone,
    /// [`ComputeBackend::project_quotas`].
    ProjectQuotas,
}

/// Records a single call made through [`FakeCompute`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComputeCall {
    /// Snapshot read.
    GetSnapshot {
        /// Project addressed.
        project: String,
        /// Snapshot name.
        name: String,
    },
    /// Snapshot creation.
    InsertSnapshot {
        /// Project addressed.
        project: String,
        /// Request body.
        snapshot: NewSnapshot,
    },
    /// Snapshot deletion.
    DeleteSnapshot {
        /// Project addressed.
        project: String,
        /// Snapshot name.
        name: String,
    },
    /// Zonal disk read.
    GetDisk {
        /// Project addressed.
        project: String,
        /// Zone addressed.
        zone: String,
        /// Disk name.
        name: String,
    },
    /// Regional disk read.
    GetRegionDisk {
        /// Project addressed.
        project: String,
        /// Region addressed.
        region: String,
        /// Disk name.
        name: String,
    },
    /// Zonal disk creation.
    InsertDisk {
        /// Project addressed.
        project: String,
        /// Zone addressed.
        zone: String,
        /// Request body.
        disk: NewDisk,
    },
    /// Regional disk creation.
    InsertRegionDisk {
        /// Project addressed.
        project: String,
        /// Region addressed.
        region: String,
        /// Request body.
        disk: NewDisk,
    },
    /// Zone read.
    GetZone {
        /// Project addressed.
        project: String,
        /// Zone name.
        zone: String,
    },
    /// Quota read.
    ProjectQuotas {
        /// Project addressed.
        project: String,
    },
}

impl ComputeCall {
    /// Operation this call exercised.
    #[must_use]
    pub const fn operation(&self) -> FakeOperation {
        match self {
            Self::GetSnapshot { .. } => FakeOperation::GetSnapshot,
            Self::InsertSnapshot { .. } => FakeOperation::InsertSnapshot,
            Self::DeleteSnapshot { .. } => FakeOperation::DeleteSnapshot,
            Self::GetDisk { .. } => FakeOperation::GetDisk,
            Self::GetRegionDisk { .. } => FakeOperation::GetRegionDisk,
            Self::InsertDisk { .. } => FakeOperation::InsertDisk,
            Self::InsertRegionDisk { .. } => FakeOperation::InsertRegionDisk,
            Self::GetZone { .. } => FakeOperation::GetZone,
            Self::ProjectQuotas { .. } => FakeOperation::ProjectQuotas,
        }
    }
}

/// Errors produced by [`FakeCompute`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeError {
    /// Raised when the addressed resource was never seeded.
    #[error("{resource} not found")]
    NotFound {
        /// Resource path that was requested.
        resource: String,
    },
    /// Raised for an operation scripted to fail.
    #[error("injected failure in {operation:?}")]
    Injected {
        /// Failing operation.
        operation: FakeOperation,
    },
}

impl ProviderError for FakeError {
    fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Debug, Default)]
struct FakeState {
    snapshots: BTreeMap<(String, String), Snapshot>,
    disks: BTreeMap<(String, String, String), Disk>,
    zones: BTreeMap<(String, String), ZoneResource>,
    quotas: BTreeMap<String, Vec<Quota>>,
    failures: BTreeSet<FakeOperation>,
    not_found: BTreeSet<FakeOperation>,
    calls: Vec<ComputeCall>,
}

/// In-memory Compute Engine double.
///
/// Disks are keyed by project, location name (zone or region) and disk name.
/// Inserts land in the same stores reads consult, so a restored disk can be
/// read back. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct FakeCompute {
    state: Arc<StdMutex<FakeState>>,
}

impl FakeCompute {
    /// Creates an empty double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a snapshot.
    #[must_use]
    pub fn with_snapshot(self, project: &str, name: &str, description: &str) -> Self {
        let snapshot = Snapshot {
            name: name.to_owned(),
            self_link: format!("{FAKE_API_BASE}/projects/{project}/global/snapshots/{name}"),
            description: description.to_owned(),
        };
        self.state()
            .snapshots
            .insert((project.to_owned(), name.to_owned()), snapshot);
        self
    }

    /// Seeds a disk in `location`, a zone or a region name.
    #[must_use]
    pub fn with_disk(
        self,
        project: &str,
        location: &str,
        name: &str,
        disk_type: &str,
        description: &str,
    ) -> Self {
        let disk = Disk {
            name: name.to_owned(),
            self_link: format!("{FAKE_API_BASE}/projects/{project}/{location}/disks/{name}"),
            disk_type: disk_type.to_owned(),
            description: description.to_owned(),
        };
        self.state().disks.insert(
            (project.to_owned(), location.to_owned(), name.to_owned()),
            disk,
        );
        self
    }

    /// Seeds a zone.
    #[must_use]
    pub fn with_zone(self, project: &str, zone: &str) -> Self {
        let resource = ZoneResource {
            name: zone.to_owned(),
            self_link: zone_link(project, zone),
        };
        self.state()
            .zones
            .insert((project.to_owned(), zone.to_owned()), resource);
        self
    }

    /// Seeds one quota metric for `project`.
    #[must_use]
    pub fn with_quota(self, project: &str, metric: &str, usage: f64, limit: f64) -> Self {
        self.state()
            .quotas
            .entry(project.to_owned())
            .or_default()
            .push(Quota {
                metric: metric.to_owned(),
                usage,
                limit,
            });
        self
    }

    /// Makes every call to `operation` fail with [`FakeError::Injected`].
    #[must_use]
    pub fn failing(self, operation: FakeOperation) -> Self {
        self.state().failures.insert(operation);
        self
    }

    /// Makes every call to `operation` fail with [`FakeError::NotFound`].
    #[must_use]
    pub fn missing(self, operation: FakeOperation) -> Self {
        self.state().not_found.insert(operation);
        self
    }

    /// Returns all calls recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ComputeCall> {
        self.state().calls.clone()
    }

    /// Returns the operations recorded so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<FakeOperation> {
        self.state()
            .calls
            .iter()
            .map(ComputeCall::operation)
            .collect()
    }

    /// Returns `true` when a snapshot with `name` exists in `project`.
    #[must_use]
    pub fn has_snapshot(&self, project: &str, name: &str) -> bool {
        self.state()
            .snapshots
            .contains_key(&(project.to_owned(), name.to_owned()))
    }

    /// Returns the disk stored under `project`, `location` and `name`.
    #[must_use]
    pub fn disk(&self, project: &str, location: &str, name: &str) -> Option<Disk> {
        self.state()
            .disks
            .get(&(project.to_owned(), location.to_owned(), name.to_owned()))
            .cloned()
    }

    fn state(&self) -> StdMutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: ComputeCall) -> Result<StdMutexGuard<'_, FakeState>, FakeError> {
        let operation = call.operation();
        let resource = format!("{call:?}");
        let mut state = self.state();
        state.calls.push(call);
        if state.failures.contains(&operation) {
            return Err(FakeError::Injected { operation });
        }
        if state.not_found.contains(&operation) {
            return Err(FakeError::NotFound { resource });
        }
        Ok(state)
    }
}

/// Self link [`FakeCompute`] assigns to a seeded zone.
#[must_use]
pub fn zone_link(project: &str, zone: &str) -> String {
    format!("{FAKE_API_BASE}/projects/{project}/zones/{zone}")
}

fn not_found(resource: String) -> FakeError {
    FakeError::NotFound { resource }
}

fn disk_from_request(project: &str, location: &str, request: &NewDisk) -> Disk {
    Disk {
        name: request.name.clone(),
        self_link: format!(
            "{FAKE_API_BASE}/projects/{project}/{location}/disks/{}",
            request.name
        ),
        disk_type: request.disk_type.clone(),
        description: request.description.clone(),
    }
}

impl ComputeBackend for FakeCompute {
    type Error = FakeError;

    fn get_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error> {
        Box::pin(async move {
            let state = self.record(ComputeCall::GetSnapshot {
                project: project.to_owned(),
                name: name.to_owned(),
            })?;
            state
                .snapshots
                .get(&(project.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| not_found(format!("projects/{project}/global/snapshots/{name}")))
        })
    }

    fn insert_snapshot<'a>(
        &'a self,
        project: &'a str,
        snapshot: &'a NewSnapshot,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ComputeCall::InsertSnapshot {
                project: project.to_owned(),
                snapshot: snapshot.clone(),
            })?;
            let stored = Snapshot {
                name: snapshot.name.clone(),
                self_link: format!(
                    "{FAKE_API_BASE}/projects/{project}/global/snapshots/{}",
                    snapshot.name
                ),
                description: snapshot.description.clone(),
            };
            state
                .snapshots
                .insert((project.to_owned(), snapshot.name.clone()), stored);
            Ok(())
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ComputeCall::DeleteSnapshot {
                project: project.to_owned(),
                name: name.to_owned(),
            })?;
            state
                .snapshots
                .remove(&(project.to_owned(), name.to_owned()))
                .map(|_| ())
                .ok_or_else(|| not_found(format!("projects/{project}/global/snapshots/{name}")))
        })
    }

    fn get_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error> {
        Box::pin(async move {
            let state = self.record(ComputeCall::GetDisk {
                project: project.to_owned(),
                zone: zone.to_owned(),
                name: name.to_owned(),
            })?;
            state
                .disks
                .get(&(project.to_owned(), zone.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| not_found(format!("projects/{project}/zones/{zone}/disks/{name}")))
        })
    }

    fn get_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error> {
        Box::pin(async move {
            let state = self.record(ComputeCall::GetRegionDisk {
                project: project.to_owned(),
                region: region.to_owned(),
                name: name.to_owned(),
            })?;
            state
                .disks
                .get(&(project.to_owned(), region.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| {
                    not_found(format!("projects/{project}/regions/{region}/disks/{name}"))
                })
        })
    }

    fn insert_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ComputeCall::InsertDisk {
                project: project.to_owned(),
                zone: zone.to_owned(),
                disk: disk.clone(),
            })?;
            state.disks.insert(
                (project.to_owned(), zone.to_owned(), disk.name.clone()),
                disk_from_request(project, zone, disk),
            );
            Ok(())
        })
    }

    fn insert_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.record(ComputeCall::InsertRegionDisk {
                project: project.to_owned(),
                region: region.to_owned(),
                disk: disk.clone(),
            })?;
            state.disks.insert(
                (project.to_owned(), region.to_owned(), disk.name.clone()),
                disk_from_request(project, region, disk),
            );
            Ok(())
        })
    }

    fn get_zone<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, ZoneResource, Self::Error> {
        Box::pin(async move {
            let state = self.record(ComputeCall::GetZone {
                project: project.to_owned(),
                zone: zone.to_owned(),
            })?;
            state
                .zones
                .get(&(project.to_owned(), zone.to_owned()))
                .cloned()
                .ok_or_else(|| not_found(format!("projects/{project}/zones/{zone}")))
        })
    }

    fn project_quotas<'a>(
        &'a self,
        project: &'a str,
    ) -> BackendFuture<'a, Vec<Quota>, Self::Error> {
        Box::pin(async move {
            let state = self.record(ComputeCall::ProjectQuotas {
                project: project.to_owned(),
            })?;
            Ok(state.quotas.get(project).cloned().unwrap_or_default())
        })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    ///
    /// Pairs with an empty value remove the variable for the guard's lifetime.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                if value.is_empty() {
                    env::remove_var(key);
                } else {
                    env::set_var(key, value);
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
