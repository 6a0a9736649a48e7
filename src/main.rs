use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use s3_dir_sync::{Hook, SyncConfig, SyncPlugin};

#[derive(Parser)]
#[command(name = "s3-dir-sync", version, about = "Mirror local directories into S3 buckets")]
struct Cli {
    /// Path to the config file (TOML). Defaults to the platform config directory.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// AWS region, overriding the config file.
    #[arg(long)]
    region: Option<String>,

    /// Shared credentials profile, overriding the config file.
    #[arg(long)]
    profile: Option<String>,

    /// PEM file with an extra CA certificate to trust.
    #[arg(long)]
    cafile: Option<PathBuf>,

    /// Fail when a bucket to empty does not exist.
    #[arg(long)]
    strict: bool,

    /// Also write logs to `s3_sync.log` in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Empty every target bucket, then upload every target directory.
    Sync,
    /// Empty every target bucket.
    Empty,
    /// Run the action bound to a deployment lifecycle event.
    Hook {
        #[arg(value_enum)]
        event: Hook,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file_layer = cli.log_dir.as_ref().map(|dir| {
        let file_appender = tracing_appender::rolling::never(dir, "s3_sync.log");
        tracing_appender::non_blocking(file_appender)
    });
    let (file_writer, _guard) = match file_layer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_writer.map(|writer| fmt::layer().with_ansi(false).with_writer(writer)))
        .with(fmt::layer())
        .init();

    let mut config = SyncConfig::load(cli.config.as_deref())?;
    match &cli.config {
        Some(path) => info!("Config loaded from: {}", path.display()),
        None => info!("Config loaded from: {:?}", SyncConfig::default_path()),
    }

    if cli.region.is_some() {
        config.region = cli.region;
    }
    if cli.profile.is_some() {
        config.profile = cli.profile;
    }
    if cli.cafile.is_some() {
        config.cafile = cli.cafile;
    }
    config.strict |= cli.strict;

    let plugin = SyncPlugin::new(config);
    let hook = match cli.command {
        Command::Sync => Hook::Sync,
        Command::Empty => Hook::BeforeRemove,
        Command::Hook { event } => event,
    };
    plugin.dispatch(hook).await?;
    Ok(())
}
