//! Command-line interface definitions for the `gce-snapshotter` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `gce-snapshotter` binary.
#[derive(Debug, Parser)]
#[command(
    name = "gce-snapshotter",
    about = "Snapshot and restore Compute Engine persistent disks backing Kubernetes volumes",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Snapshot a disk and print the snapshot name.
    #[command(name = "create-snapshot")]
    CreateSnapshot(CreateSnapshotCommand),
    /// Delete a snapshot; a missing snapshot is not an error.
    #[command(name = "delete-snapshot")]
    DeleteSnapshot(DeleteSnapshotCommand),
    /// Create a disk from a snapshot and print the disk name.
    #[command(name = "restore")]
    Restore(RestoreCommand),
    /// Print the type of an existing disk.
    #[command(name = "volume-info")]
    VolumeInfo(VolumeInfoCommand),
    /// Read or rewrite the disk a persistent volume points at.
    #[command(name = "volume-id", subcommand)]
    VolumeId(VolumeIdCommand),
}

/// Arguments for `gce-snapshotter create-snapshot`.
#[derive(Debug, Parser)]
pub(crate) struct CreateSnapshotCommand {
    /// Disk name to snapshot.
    #[arg(long, value_name = "DISK")]
    pub(crate) volume_id: String,
    /// Zone of the disk, or `__`-joined zones for a regional disk.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: String,
    /// Tag to record on the snapshot; repeat for several.
    #[arg(long = "tag", value_name = "KEY=VALUE", value_parser = parse_tag)]
    pub(crate) tags: Vec<(String, String)>,
}

/// Arguments for `gce-snapshotter delete-snapshot`.
#[derive(Debug, Parser)]
pub(crate) struct DeleteSnapshotCommand {
    /// Snapshot name to delete.
    #[arg(long, value_name = "SNAPSHOT")]
    pub(crate) snapshot_id: String,
}

/// Arguments for `gce-snapshotter restore`.
#[derive(Debug, Parser)]
pub(crate) struct RestoreCommand {
    /// Snapshot name to restore from.
    #[arg(long, value_name = "SNAPSHOT")]
    pub(crate) snapshot_id: String,
    /// Disk type of the new disk, for example `pd-ssd`.
    #[arg(long, value_name = "TYPE")]
    pub(crate) volume_type: String,
    /// Zone of the new disk, or `__`-joined zones for a regional disk.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: String,
    /// Requested IOPS; accepted and ignored.
    #[arg(long, value_name = "IOPS")]
    pub(crate) iops: Option<i64>,
}

/// Arguments for `gce-snapshotter volume-info`.
#[derive(Debug, Parser)]
pub(crate) struct VolumeInfoCommand {
    /// Disk name to inspect.
    #[arg(long, value_name = "DISK")]
    pub(crate) volume_id: String,
    /// Zone of the disk, or `__`-joined zones for a regional disk.
    #[arg(long, value_name = "ZONE")]
    pub(crate) zone: String,
}

/// Subcommands of `gce-snapshotter volume-id`.
#[derive(Debug, Subcommand)]
pub(crate) enum VolumeIdCommand {
    /// Print the disk name a persistent volume points at.
    Get {
        /// Persistent volume JSON document.
        #[arg(long, value_name = "FILE")]
        pv: String,
    },
    /// Print the persistent volume rewritten to point at another disk.
    Set {
        /// Persistent volume JSON document.
        #[arg(long, value_name = "FILE")]
        pv: String,
        /// Disk name to point at.
        #[arg(long, value_name = "DISK")]
        volume_id: String,
    },
}

/// Parses a `key=value` tag argument.
pub(crate) fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_owned(), value.to_owned()))
        }
        _ => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}
