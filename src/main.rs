use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use release_relay::DeliveryPolicy;
use release_relay::Engine;
use release_relay::EngineHandle;
use release_relay::KubeClient;
use release_relay::LogSink;
use release_relay::RelayConfig;
use release_relay::Result;
use release_relay::RunMode;
use release_relay::SinkRegistration;
use release_relay::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tracing::error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "release-relay", version)]
#[command(about = "Relays pipeline release changes to event sinks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report pipeline resources
    Report {
        #[command(subcommand)]
        resource: Resource,
    },
}

#[derive(Subcommand, Debug)]
enum Resource {
    /// Report releases, optionally following every later change
    Releases(ReleasesArgs),
}

#[derive(Args, Debug)]
struct ReleasesArgs {
    /// Keep watching for changes after the initial listing
    #[arg(short, long)]
    watch: bool,

    /// Extra configuration file, applied on top of `CONFIG_PATH`
    #[arg(long)]
    config: Option<PathBuf>,

    /// Namespace to report releases from
    #[arg(short, long)]
    namespace: Option<String>,

    /// Log every event as full JSON
    #[arg(long)]
    verbose: bool,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    init_observability();

    let Command::Report {
        resource: Resource::Releases(args),
    } = Cli::parse().command;

    match report_releases(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("release-relay failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn report_releases(args: ReleasesArgs) -> Result<()> {
    let config = load_config(&args)?;
    let mode = if args.watch { RunMode::Watch } else { RunMode::Once };

    let client = Arc::new(KubeClient::new(&config.source)?);
    let sinks = vec![SinkRegistration::new(
        "log",
        Arc::new(LogSink::new(args.verbose)),
        DeliveryPolicy::from_config(&config),
    )];

    let engine = Engine::new(config, client, sinks);

    let handle = engine.handle();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(handle).await {
            error!("Failed to listen for shutdown signals: {:?}", e);
        }
    });

    let report = engine.run(mode).await?;
    info!(
        relayed = report.relayed,
        suppressed = report.suppressed,
        skipped = report.skipped,
        "Report completed"
    );
    Ok(())
}

fn load_config(args: &ReleasesArgs) -> Result<RelayConfig> {
    let mut config = RelayConfig::new()?;
    if let Some(path) = &args.config {
        config = config.with_override_config(&path.to_string_lossy())?;
    }
    if let Some(namespace) = &args.namespace {
        config.source.namespace = namespace.clone();
    }
    config.validate()
}

async fn graceful_shutdown(handle: EngineHandle) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    info!("Stopping engine..");
    handle.stop();
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
