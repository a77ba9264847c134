//! Compute Engine v1 REST implementation of [`ComputeBackend`].
//!
//! Mutating calls return as soon as the API accepts the request; the
//! long-running operation it starts is not awaited.

mod error;
mod types;

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{
    BackendFuture, ComputeBackend, Disk, NewDisk, NewSnapshot, Quota, Snapshot, ZoneResource,
};
use crate::config::SnapshotterConfig;
use types::{
    DiskInsert, DiskResource, ProjectResource, SnapshotInsert, SnapshotResource, ZoneWire,
};

pub use error::GceError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Backend that talks to the Compute Engine v1 REST API.
#[derive(Clone)]
pub struct GceComputeBackend {
    endpoint: String,
    access_token: Option<String>,
}

impl fmt::Debug for GceComputeBackend {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GceComputeBackend")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl GceComputeBackend {
    /// Creates a backend for `endpoint`, presenting `access_token` as a bearer
    /// token when one is given.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, access_token: Option<String>) -> Self {
        let raw: String = endpoint.into();
        Self {
            endpoint: raw.trim_end_matches('/').to_owned(),
            access_token,
        }
    }

    /// Creates a backend from the configured endpoint and token.
    #[must_use]
    pub fn from_config(config: &SnapshotterConfig) -> Self {
        Self::new(config.api_endpoint.clone(), config.access_token.clone())
    }

    /// API base URL without a trailing slash.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &ResourcePath) -> Result<Url, GceError> {
        if let Some(segment) = path
            .segments
            .iter()
            .find(|segment| matches!(segment.as_str(), "" | "." | ".."))
        {
            return Err(GceError::InvalidName {
                resource: path.to_string(),
                segment: segment.clone(),
            });
        }

        let invalid_endpoint = |message: String| GceError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            message,
        };
        let mut url =
            Url::parse(&self.endpoint).map_err(|err| invalid_endpoint(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid_endpoint(String::from("endpoint cannot carry a path")))?
            .pop_if_empty()
            .extend(&path.segments);
        Ok(url)
    }

    fn request(&self, method: Method, path: &ResourcePath) -> Result<RequestBuilder, GceError> {
        let mut builder = HTTP_CLIENT.request(method, self.url(path)?);
        if let Some(token) = self.access_token.as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn execute(&self, resource: &str, request: RequestBuilder) -> Result<Vec<u8>, GceError> {
        debug!(%resource, "sending compute request");
        let response = request
            .send()
            .await
            .map_err(|err| transport_error(resource, &err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(resource, &err))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }
        Err(status_error(resource, status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &ResourcePath) -> Result<T, GceError> {
        let resource = path.to_string();
        let body = self
            .execute(&resource, self.request(Method::GET, path)?)
            .await?;
        decode(&resource, &body)
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        path: &ResourcePath,
        payload: &T,
    ) -> Result<(), GceError> {
        let request = self.request(Method::POST, path)?.json(payload);
        self.execute(&path.to_string(), request).await.map(|_| ())
    }
}

/// API path below the endpoint, kept as unescaped segments until a URL is
/// built so that each name stays a single segment.
#[derive(Clone, Debug, Eq, PartialEq)]
struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    fn project(project: &str) -> Self {
        Self {
            segments: vec![String::from("projects"), project.to_owned()],
        }
    }

    fn child(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_owned());
        self
    }

    fn snapshots(project: &str) -> Self {
        Self::project(project).child("global").child("snapshots")
    }

    fn snapshot(project: &str, name: &str) -> Self {
        Self::snapshots(project).child(name)
    }

    fn zone(project: &str, zone: &str) -> Self {
        Self::project(project).child("zones").child(zone)
    }

    fn region(project: &str, region: &str) -> Self {
        Self::project(project).child("regions").child(region)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.segments.join("/"))
    }
}

fn transport_error(resource: &str, err: &reqwest::Error) -> GceError {
    GceError::Transport {
        resource: resource.to_owned(),
        message: err.to_string(),
    }
}

fn status_error(resource: &str, status: StatusCode, body: &[u8]) -> GceError {
    if status == StatusCode::NOT_FOUND {
        return GceError::NotFound {
            resource: resource.to_owned(),
        };
    }
    GceError::Api {
        resource: resource.to_owned(),
        status: status.as_u16(),
        message: String::from_utf8_lossy(body).into_owned(),
    }
}

fn decode<T: DeserializeOwned>(resource: &str, body: &[u8]) -> Result<T, GceError> {
    serde_json::from_slice(body).map_err(|err| GceError::Decode {
        resource: resource.to_owned(),
        message: err.to_string(),
    })
}

impl ComputeBackend for GceComputeBackend {
    type Error = GceError;

    fn get_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Snapshot, Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::snapshot(project, name);
            let snapshot: SnapshotResource = self.get_json(&path).await?;
            Ok(snapshot.into())
        })
    }

    fn insert_snapshot<'a>(
        &'a self,
        project: &'a str,
        snapshot: &'a NewSnapshot,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::snapshots(project);
            self.post_json(&path, &SnapshotInsert::from(snapshot))
                .await
        })
    }

    fn delete_snapshot<'a>(
        &'a self,
        project: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::snapshot(project, name);
            self.execute(&path.to_string(), self.request(Method::DELETE, &path)?)
                .await
                .map(|_| ())
        })
    }

    fn get_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::zone(project, zone).child("disks").child(name);
            let disk: DiskResource = self.get_json(&path).await?;
            Ok(disk.into())
        })
    }

    fn get_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        name: &'a str,
    ) -> BackendFuture<'a, Disk, Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::region(project, region)
                .child("disks")
                .child(name);
            let disk: DiskResource = self.get_json(&path).await?;
            Ok(disk.into())
        })
    }

    fn insert_disk<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::zone(project, zone).child("disks");
            self.post_json(&path, &DiskInsert::from(disk)).await
        })
    }

    fn insert_region_disk<'a>(
        &'a self,
        project: &'a str,
        region: &'a str,
        disk: &'a NewDisk,
    ) -> BackendFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = ResourcePath::region(project, region).child("disks");
            self.post_json(&path, &DiskInsert::from(disk)).await
        })
    }

    fn get_zone<'a>(
        &'a self,
        project: &'a str,
        zone: &'a str,
    ) -> BackendFuture<'a, ZoneResource, Self::Error> {
        Box::pin(async move {
            let found: ZoneWire = self.get_json(&ResourcePath::zone(project, zone)).await?;
            Ok(found.into())
        })
    }

    fn project_quotas<'a>(
        &'a self,
        project: &'a str,
    ) -> BackendFuture<'a, Vec<Quota>, Self::Error> {
        Box::pin(async move {
            let found: ProjectResource = self.get_json(&ResourcePath::project(project)).await?;
            Ok(found.quotas.into_iter().map(Quota::from).collect())
        })
    }
}
