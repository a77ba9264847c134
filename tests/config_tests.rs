//! Configuration loading, defaults, and plugin config-map validation.

use std::collections::HashMap;

use gce_snapshotter::config::{DEFAULT_API_ENDPOINT, PROJECT_KEY, VOLUME_PROJECT_KEY};
use gce_snapshotter::test_support::EnvGuard;
use gce_snapshotter::{ConfigError, GceComputeBackend, SnapshotType, SnapshotterConfig};
use rstest::rstest;

const CONFIG_VARS: [&str; 6] = [
    "GCE_SNAPSHOTTER_PROJECT",
    "GCE_SNAPSHOTTER_CREDENTIALS_PROJECT",
    "GCE_SNAPSHOTTER_SNAPSHOT_LOCATION",
    "GCE_SNAPSHOTTER_SNAPSHOT_TYPE",
    "GCE_SNAPSHOTTER_ACCESS_TOKEN",
    "GCE_SNAPSHOTTER_API_ENDPOINT",
];

async fn env_with(overrides: &[(&'static str, &'static str)]) -> EnvGuard {
    let mut pairs: Vec<(&str, &str)> = CONFIG_VARS
        .iter()
        .copied()
        .filter(|key| !overrides.iter().any(|(name, _)| name == key))
        .map(|key| (key, ""))
        .collect();
    pairs.extend_from_slice(overrides);
    EnvGuard::set_vars(&pairs).await
}

#[tokio::test]
async fn environment_supplies_volume_project_and_defaults() {
    let _guard = env_with(&[("GCE_SNAPSHOTTER_VOLUME_PROJECT", "disks")]).await;

    let config = SnapshotterConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config loads: {err}"));
    assert_eq!(config.snapshot_type, "STANDARD");
    assert_eq!(config.api_endpoint, DEFAULT_API_ENDPOINT);

    let settings = config
        .settings()
        .unwrap_or_else(|err| panic!("settings resolve: {err}"));
    assert_eq!(settings.volume_project, "disks");
    assert_eq!(settings.snapshot_project, "disks");
    assert_eq!(settings.snapshot_type, SnapshotType::Standard);
    assert_eq!(settings.snapshot_location, None);
}

#[tokio::test]
async fn environment_overrides_snapshot_settings() {
    let _guard = env_with(&[
        ("GCE_SNAPSHOTTER_VOLUME_PROJECT", "disks"),
        ("GCE_SNAPSHOTTER_PROJECT", "backups"),
        ("GCE_SNAPSHOTTER_SNAPSHOT_TYPE", "archive"),
        ("GCE_SNAPSHOTTER_SNAPSHOT_LOCATION", "europe-west4"),
        ("GCE_SNAPSHOTTER_API_ENDPOINT", "http://127.0.0.1:9/compute/v1/"),
    ])
    .await;

    let config = SnapshotterConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config loads: {err}"));
    let settings = config
        .settings()
        .unwrap_or_else(|err| panic!("settings resolve: {err}"));
    assert_eq!(settings.snapshot_project, "backups");
    assert_eq!(settings.snapshot_type, SnapshotType::Archive);
    assert_eq!(settings.snapshot_location.as_deref(), Some("europe-west4"));

    let backend = GceComputeBackend::from_config(&config);
    assert_eq!(backend.endpoint(), "http://127.0.0.1:9/compute/v1");
}

#[tokio::test]
async fn missing_volume_project_names_env_var_and_file() {
    let _guard = env_with(&[("GCE_SNAPSHOTTER_VOLUME_PROJECT", "")]).await;

    let config = SnapshotterConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config loads: {err}"));
    let err = config.validate().expect_err("volume project required");
    let ConfigError::MissingField(ref message) = err else {
        panic!("expected MissingField error, got {err:?}");
    };
    assert!(
        message.contains("GCE_SNAPSHOTTER_VOLUME_PROJECT"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("gce-snapshotter.toml"),
        "error should mention config file: {message}"
    );
}

#[rstest]
#[case("STANDARD", SnapshotType::Standard)]
#[case("", SnapshotType::Standard)]
#[case("archive", SnapshotType::Archive)]
fn plugin_config_snapshot_types(#[case] raw: &str, #[case] expected: SnapshotType) {
    let values = HashMap::from([
        (String::from(VOLUME_PROJECT_KEY), String::from("disks")),
        (String::from("snapshotType"), String::from(raw)),
    ]);
    let settings = SnapshotterConfig::from_plugin_config(&values)
        .and_then(|config| config.settings())
        .unwrap_or_else(|err| panic!("settings resolve: {err}"));
    assert_eq!(settings.snapshot_type, expected);
}

#[test]
fn plugin_config_rejects_unknown_snapshot_type() {
    let values = HashMap::from([
        (String::from(VOLUME_PROJECT_KEY), String::from("disks")),
        (String::from("snapshotType"), String::from("coldline")),
    ]);
    let err = SnapshotterConfig::from_plugin_config(&values)
        .and_then(|config| config.settings())
        .expect_err("unknown type");
    assert_eq!(err.to_string(), "unsupported snapshot type: \"COLDLINE\"");
}

#[test]
fn plugin_config_accepts_credentials_file_without_using_it() {
    let values = HashMap::from([
        (String::from(PROJECT_KEY), String::from("backups")),
        (String::from(VOLUME_PROJECT_KEY), String::from("disks")),
        (String::from("credentialsFile"), String::from("/secrets/sa.json")),
    ]);
    let config = SnapshotterConfig::from_plugin_config(&values)
        .unwrap_or_else(|err| panic!("config accepted: {err}"));
    assert_eq!(config.credentials_file.as_deref(), Some("/secrets/sa.json"));
    assert_eq!(
        config.settings().map(|settings| settings.snapshot_project),
        Ok(String::from("backups"))
    );
}

#[test]
fn plugin_config_lists_every_unknown_key() {
    let values = HashMap::from([
        (String::from("region"), String::from("x")),
        (String::from("bucket"), String::from("y")),
    ]);
    let err = SnapshotterConfig::from_plugin_config(&values).expect_err("unknown keys");
    assert_eq!(err.to_string(), "unsupported configuration keys: bucket, region");
}
