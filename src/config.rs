//! Configuration loading via `ortho-config`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::volume_id::CsiDriverSet;

/// Compute Engine REST endpoint used when none is configured.
pub const DEFAULT_API_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Plugin config key naming the project that owns snapshots.
pub const PROJECT_KEY: &str = "project";
/// Plugin config key naming the project that owns disks.
pub const VOLUME_PROJECT_KEY: &str = "volumeProject";
/// Plugin config key pinning snapshots to a storage location.
pub const SNAPSHOT_LOCATION_KEY: &str = "snapshotLocation";
/// Plugin config key selecting the snapshot class.
pub const SNAPSHOT_TYPE_KEY: &str = "snapshotType";
/// Plugin config key pointing at a service-account key file.
pub const CREDENTIALS_FILE_KEY: &str = "credentialsFile";

const PLUGIN_KEYS: [&str; 5] = [
    SNAPSHOT_LOCATION_KEY,
    SNAPSHOT_TYPE_KEY,
    PROJECT_KEY,
    CREDENTIALS_FILE_KEY,
    VOLUME_PROJECT_KEY,
];

/// Snapshotter configuration derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "GCE_SNAPSHOTTER",
    discovery(
        app_name = "gce-snapshotter",
        env_var = "GCE_SNAPSHOTTER_CONFIG_PATH",
        config_file_name = "gce-snapshotter.toml",
        dotfile_name = ".gce-snapshotter.toml",
        project_file_name = "gce-snapshotter.toml"
    )
)]
pub struct SnapshotterConfig {
    /// Project that owns snapshots. Defaults to the volume project.
    pub project: Option<String>,
    /// Project that owns disks. Defaults to the credentials project.
    pub volume_project: Option<String>,
    /// Project the ambient credentials belong to.
    pub credentials_project: Option<String>,
    /// Service-account key file. Recorded only; credential loading happens
    /// outside this crate.
    pub credentials_file: Option<String>,
    /// Storage location snapshots are pinned to, for example `us-central1`.
    pub snapshot_location: Option<String>,
    /// Snapshot class, `STANDARD` or `ARCHIVE` in any case.
    #[ortho_config(default = "STANDARD".to_owned())]
    pub snapshot_type: String,
    /// OAuth bearer token presented to the Compute Engine API.
    pub access_token: Option<String>,
    /// Compute Engine REST endpoint.
    #[ortho_config(default = DEFAULT_API_ENDPOINT.to_owned())]
    pub api_endpoint: String,
}

/// Snapshot storage class.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SnapshotType {
    /// Regular snapshots.
    #[default]
    Standard,
    /// Lower-cost snapshots intended for long retention.
    Archive,
}

impl SnapshotType {
    /// Wire name used by the Compute Engine API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Archive => "ARCHIVE",
        }
    }
}

impl FromStr for SnapshotType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "STANDARD" => Ok(Self::Standard),
            "ARCHIVE" => Ok(Self::Archive),
            other => Err(ConfigError::UnsupportedSnapshotType(other.to_owned())),
        }
    }
}

impl fmt::Display for SnapshotType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Validated settings fixed for the lifetime of a snapshotter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotterSettings {
    /// Project that owns disks.
    pub volume_project: String,
    /// Project that owns snapshots.
    pub snapshot_project: String,
    /// Storage location snapshots are pinned to.
    pub snapshot_location: Option<String>,
    /// Snapshot class.
    pub snapshot_type: SnapshotType,
    /// CSI drivers whose handles are recognised.
    pub drivers: CsiDriverSet,
}

impl SnapshotterSettings {
    /// Creates settings with one project owning both disks and snapshots.
    pub fn new(project: impl Into<String>) -> Self {
        let owner: String = project.into();
        Self {
            snapshot_project: owner.clone(),
            volume_project: owner,
            snapshot_location: None,
            snapshot_type: SnapshotType::Standard,
            drivers: CsiDriverSet::default(),
        }
    }

    /// Replaces the recognised CSI drivers.
    #[must_use]
    pub fn with_drivers(mut self, drivers: CsiDriverSet) -> Self {
        self.drivers = drivers;
        self
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl SnapshotterConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Ok(Self::load()?)
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Ok(Self::load_from_iter([std::ffi::OsString::from(
            "gce-snapshotter",
        )])?)
    }

    /// Builds configuration from the string map a backup tool hands its
    /// volume snapshot plugins.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKeys`] when the map carries keys outside
    /// the supported set.
    pub fn from_plugin_config<S: std::hash::BuildHasher>(
        values: &HashMap<String, String, S>,
    ) -> Result<Self, ConfigError> {
        let mut unknown: Vec<String> = values
            .keys()
            .filter(|key| !PLUGIN_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            unknown.sort();
            return Err(ConfigError::UnknownKeys(unknown));
        }

        let lookup = |key: &str| {
            values
                .get(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        Ok(Self {
            project: lookup(PROJECT_KEY),
            volume_project: lookup(VOLUME_PROJECT_KEY),
            credentials_project: None,
            credentials_file: lookup(CREDENTIALS_FILE_KEY),
            snapshot_location: lookup(SNAPSHOT_LOCATION_KEY),
            snapshot_type: lookup(SNAPSHOT_TYPE_KEY).unwrap_or_default(),
            access_token: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_owned(),
        })
    }

    /// Resolves project defaults and validates the snapshot class.
    ///
    /// The volume project falls back to the credentials project and the
    /// snapshot project falls back to the volume project.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no volume project can be
    /// resolved and [`ConfigError::UnsupportedSnapshotType`] for an unknown
    /// snapshot class.
    pub fn settings(&self) -> Result<SnapshotterSettings, ConfigError> {
        let volume_project = non_blank(self.volume_project.as_deref())
            .or_else(|| non_blank(self.credentials_project.as_deref()))
            .ok_or_else(|| {
                missing_field(&FieldMetadata {
                    description: "volume project",
                    env_var: "GCE_SNAPSHOTTER_VOLUME_PROJECT",
                    toml_key: "volume_project",
                })
            })?;
        let snapshot_project =
            non_blank(self.project.as_deref()).unwrap_or_else(|| volume_project.clone());
        let snapshot_type = self.snapshot_type.parse::<SnapshotType>()?;

        Ok(SnapshotterSettings {
            volume_project,
            snapshot_project,
            snapshot_location: non_blank(self.snapshot_location.as_deref()),
            snapshot_type,
            drivers: CsiDriverSet::default(),
        })
    }

    /// Performs semantic validation without keeping the resolved settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as
    /// [`SnapshotterConfig::settings`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings().map(|_| ())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

fn missing_field(metadata: &FieldMetadata) -> ConfigError {
    ConfigError::MissingField(format!(
        "missing {}: set {} or add {} to gce-snapshotter.toml",
        metadata.description, metadata.env_var, metadata.toml_key
    ))
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised for a snapshot class other than `STANDARD` or `ARCHIVE`.
    #[error("unsupported snapshot type: {0:?}")]
    UnsupportedSnapshotType(String),
    /// Raised when a plugin config map carries unsupported keys.
    #[error("unsupported configuration keys: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),
}

impl From<Arc<ortho_config::OrthoError>> for ConfigError {
    fn from(value: Arc<ortho_config::OrthoError>) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn base_config() -> SnapshotterConfig {
        SnapshotterConfig {
            project: None,
            volume_project: None,
            credentials_project: Some(String::from("creds-project")),
            credentials_file: None,
            snapshot_location: None,
            snapshot_type: String::from("STANDARD"),
            access_token: None,
            api_endpoint: DEFAULT_API_ENDPOINT.to_owned(),
        }
    }

    #[rstest]
    #[case("", SnapshotType::Standard)]
    #[case("standard", SnapshotType::Standard)]
    #[case("STANDARD", SnapshotType::Standard)]
    #[case("archive", SnapshotType::Archive)]
    #[case("Archive", SnapshotType::Archive)]
    fn snapshot_type_parses_case_insensitively(#[case] raw: &str, #[case] expected: SnapshotType) {
        assert_eq!(raw.parse::<SnapshotType>(), Ok(expected));
    }

    #[test]
    fn snapshot_type_rejects_unknown_class() {
        assert_eq!(
            "coldline".parse::<SnapshotType>(),
            Err(ConfigError::UnsupportedSnapshotType(String::from(
                "COLDLINE"
            )))
        );
    }

    #[rstest]
    fn projects_default_to_credentials_project(base_config: SnapshotterConfig) {
        let settings = base_config.settings().expect("settings");
        assert_eq!(settings.volume_project, "creds-project");
        assert_eq!(settings.snapshot_project, "creds-project");
        assert_eq!(settings.snapshot_type, SnapshotType::Standard);
        assert_eq!(settings.snapshot_location, None);
    }

    #[rstest]
    fn explicit_projects_take_precedence(base_config: SnapshotterConfig) {
        let cfg = SnapshotterConfig {
            project: Some(String::from("snapshots")),
            volume_project: Some(String::from("disks")),
            ..base_config
        };
        let settings = cfg.settings().expect("settings");
        assert_eq!(settings.volume_project, "disks");
        assert_eq!(settings.snapshot_project, "snapshots");
    }

    #[rstest]
    fn snapshot_project_follows_volume_project(base_config: SnapshotterConfig) {
        let cfg = SnapshotterConfig {
            volume_project: Some(String::from("disks")),
            ..base_config
        };
        assert_eq!(cfg.settings().expect("settings").snapshot_project, "disks");
    }

    #[rstest]
    fn missing_volume_project_is_actionable(base_config: SnapshotterConfig) {
        let cfg = SnapshotterConfig {
            credentials_project: Some(String::from("  ")),
            ..base_config
        };
        let err = cfg.settings().expect_err("volume project required");
        let ConfigError::MissingField(ref message) = err else {
            panic!("expected MissingField error, got {err:?}");
        };
        assert!(message.contains("GCE_SNAPSHOTTER_VOLUME_PROJECT"), "{message}");
        assert!(message.contains("volume_project"), "{message}");
    }

    #[rstest]
    fn invalid_snapshot_type_fails_settings(base_config: SnapshotterConfig) {
        let cfg = SnapshotterConfig {
            snapshot_type: String::from("nearline"),
            ..base_config
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnsupportedSnapshotType(_))
        ));
    }

    #[test]
    fn plugin_config_reads_known_keys() {
        let values = HashMap::from([
            (String::from("project"), String::from("snapshots")),
            (String::from("volumeProject"), String::from("disks")),
            (String::from("snapshotLocation"), String::from("us-central1")),
            (String::from("snapshotType"), String::from("archive")),
        ]);
        let settings = SnapshotterConfig::from_plugin_config(&values)
            .and_then(|cfg| cfg.settings())
            .expect("settings");
        assert_eq!(settings.volume_project, "disks");
        assert_eq!(settings.snapshot_project, "snapshots");
        assert_eq!(settings.snapshot_location.as_deref(), Some("us-central1"));
        assert_eq!(settings.snapshot_type, SnapshotType::Archive);
    }

    #[test]
    fn plugin_config_rejects_unknown_keys() {
        let values = HashMap::from([
            (String::from("zeta"), String::from("1")),
            (String::from("project"), String::from("p")),
            (String::from("alpha"), String::from("2")),
        ]);
        let err = SnapshotterConfig::from_plugin_config(&values).expect_err("unknown keys");
        assert_eq!(
            err,
            ConfigError::UnknownKeys(vec![String::from("alpha"), String::from("zeta")])
        );
        assert_eq!(err.to_string(), "unsupported configuration keys: alpha, zeta");
    }

    #[test]
    fn plugin_config_without_volume_project_needs_credentials_project() {
        let values = HashMap::from([(String::from("project"), String::from("p"))]);
        let cfg = SnapshotterConfig::from_plugin_config(&values).expect("config");
        assert_eq!(cfg.snapshot_type, "");
        assert_eq!(
            cfg.settings().map(|settings| settings.snapshot_type),
            Err(ConfigError::MissingField(String::from(
                "missing volume project: set GCE_SNAPSHOTTER_VOLUME_PROJECT or add volume_project to gce-snapshotter.toml"
            )))
        );
    }

    #[test]
    fn loader_errors_become_parse_errors() {
        let err = ConfigError::from(Arc::new(ortho_config::OrthoError::Validation {
            key: String::from("snapshot_type"),
            message: String::from("not a string"),
        }));
        assert_eq!(
            err,
            ConfigError::Parse(String::from(
                "Validation failed for 'snapshot_type': not a string"
            ))
        );
    }
}
