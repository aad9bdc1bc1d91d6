mod platform;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracker_core::{JobKind, Transport};

use platform::logging::LogDestination;

/// Follow a long-running remote job until it finishes.
#[derive(Parser, Debug)]
#[command(name = "tracker_app", version, about, long_about = None)]
struct Args {
    /// Job service root, e.g. https://api.example.com/v1/
    #[arg(long)]
    base_url: Option<String>,

    /// Id of the job to follow
    #[arg(long)]
    job_id: String,

    /// Preset that decides milestones, transport and status vocabulary
    #[arg(long, default_value = "competitor-analysis")]
    kind: JobKind,

    /// Overrides the preset's transport
    #[arg(long)]
    transport: Option<Transport>,

    /// RON file with connection and timing settings
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    log: LogDestination,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    platform::logging::initialize(args.log, args.verbose);

    let file = platform::config::load(args.config.as_deref())
        .context("could not load tracker configuration")?;
    let settings = file
        .resolve(args.base_url.as_deref())
        .context("invalid tracker configuration")?;

    let mut descriptor = args.kind.descriptor(args.job_id);
    if let Some(transport) = args.transport {
        descriptor = descriptor.with_transport(transport);
    }
    if let Some(interval) = settings.poll_interval {
        descriptor = descriptor.with_poll_interval(interval);
    }

    let code = platform::app::run(settings, descriptor).await?;
    Ok(ExitCode::from(code))
}
