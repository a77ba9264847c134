//! Binary entry point for the `gce-snapshotter` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use clap::Parser;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use gce_snapshotter::{
    ConfigError, CsiDriverSet, GceComputeBackend, GceError, SnapshotterConfig, SnapshotterError,
    Tags, VolumeIdCodec, VolumeIdError, VolumeSnapshotter,
};

mod cli;

use cli::{Cli, VolumeIdCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshotter(#[from] SnapshotterError<GceError>),
    #[error(transparent)]
    VolumeId(#[from] VolumeIdError),
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("{path} is not a JSON document: {message}")]
    Decode { path: String, message: String },
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<(), CliError> {
    match cli {
        Cli::CreateSnapshot(args) => {
            let tags: Tags = args.tags.into_iter().collect();
            let name = snapshotter()?
                .create_snapshot(&args.volume_id, &args.zone, &tags)
                .await?;
            writeln!(out, "{name}")?;
        }
        Cli::DeleteSnapshot(args) => {
            snapshotter()?.delete_snapshot(&args.snapshot_id).await?;
        }
        Cli::Restore(args) => {
            let name = snapshotter()?
                .create_volume_from_snapshot(
                    &args.snapshot_id,
                    &args.volume_type,
                    &args.zone,
                    args.iops,
                )
                .await?;
            writeln!(out, "{name}")?;
        }
        Cli::VolumeInfo(args) => {
            let info = snapshotter()?
                .get_volume_info(&args.volume_id, &args.zone)
                .await?;
            writeln!(out, "{}", info.volume_type)?;
        }
        Cli::VolumeId(command) => run_volume_id(command, out)?,
    }
    Ok(())
}

fn run_volume_id(command: VolumeIdCommand, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        VolumeIdCommand::Get { pv } => {
            // Reading a handle never consults the volume project.
            let codec = VolumeIdCodec::new(CsiDriverSet::default(), String::new());
            let document = read_document(&pv)?;
            if let Some(id) = codec.get_volume_id(&document)? {
                writeln!(out, "{id}")?;
            }
        }
        VolumeIdCommand::Set { pv, volume_id } => {
            let settings = SnapshotterConfig::load_without_cli_args()?.settings()?;
            let codec = VolumeIdCodec::new(settings.drivers, settings.volume_project);
            let document = read_document(&pv)?;
            let updated = codec.set_volume_id(&document, &volume_id)?;
            let rendered = serde_json::to_string_pretty(&updated).map_err(io::Error::from)?;
            writeln!(out, "{rendered}")?;
        }
    }
    Ok(())
}

fn snapshotter() -> Result<VolumeSnapshotter<GceComputeBackend>, CliError> {
    let config = SnapshotterConfig::load_without_cli_args()?;
    let settings = config.settings()?;
    Ok(VolumeSnapshotter::new(
        GceComputeBackend::from_config(&config),
        settings,
    ))
}

fn read_document(path: &str) -> Result<Value, CliError> {
    let raw = read_to_string_ambient(path).map_err(|message| CliError::Read {
        path: path.to_owned(),
        message,
    })?;
    serde_json::from_str(&raw).map_err(|err| CliError::Decode {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);
    let file_name = path_buf
        .file_name()
        .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
    let dir_path = path_buf
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_name).map_err(|err| err.to_string())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
