//! Chrome Screenshot CLI
//!
//! Runs the addon's phases against a scripted fixture host, the way the
//! capture driver would run them inside a real story catalog.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use screenshot_addon::{
    AddonConfig, FixtureCatalog, FixtureHost, LaunchParams, ManifestSink, PhaseController,
    PhaseOutcome, PhaseTypes, SinkStatus,
};
use screenshot_channel::LocalChannel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chrome-screenshot")]
#[command(about = "Story readiness detection for screenshot capture", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the phase encoded in a page location against a fixture host
    Run {
        /// Fixture file describing kinds, stories and their wrappers
        #[arg(short, long)]
        fixture: PathBuf,

        /// Page location carrying the chrome-screenshot query parameters
        #[arg(short, long)]
        url: String,

        /// Output directory for the contexts manifest
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Milliseconds to wait for a story's first wrapper
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Seconds to wait for the capture target to report ready
        #[arg(long, default_value = "30")]
        ready_timeout: u64,

        /// Directory holding chrome-screenshot.config.json
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },

    /// Print the flattened story list of a fixture
    Stories {
        /// Fixture file describing kinds, stories and their wrappers
        fixture: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            fixture,
            url,
            output,
            timeout_ms,
            ready_timeout,
            config_dir,
        } => {
            run_phase(RunArgs {
                fixture,
                url,
                output,
                timeout_ms,
                ready_timeout: Duration::from_secs(ready_timeout),
                config_dir,
            })
            .await
        }
        Commands::Stories { fixture } => list_stories(fixture),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

struct RunArgs {
    fixture: PathBuf,
    url: String,
    output: Option<PathBuf>,
    timeout_ms: Option<u64>,
    ready_timeout: Duration,
    config_dir: PathBuf,
}

async fn run_phase(args: RunArgs) -> anyhow::Result<()> {
    let config = AddonConfig::load(&args.config_dir)?;
    let output = args.output.unwrap_or_else(|| config.output_dir.clone());
    let search_timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.search_timeout());

    let fixture = FixtureCatalog::load(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;

    info!("Fixture: {}", args.fixture.display());
    info!("Output: {}", output.display());

    let channel = Arc::new(LocalChannel::new());
    let host = Arc::new(FixtureHost::new(channel.clone(), fixture));
    let sink = Arc::new(ManifestSink::new(&output)?);
    let controller = Arc::new(
        PhaseController::new(channel.clone(), host.clone(), sink.clone())
            .with_search_timeout(search_timeout),
    );

    let params = LaunchParams::from_location(&args.url);
    let preparing = params.phase.as_deref() == Some(PhaseTypes::PREPARE);

    let run = tokio::spawn({
        let controller = controller.clone();
        async move { controller.run(&params).await }
    });

    // The catalog only matters to a prepare run, which listens for it
    if preparing {
        host.publish_catalog_when_ready().await?;
    } else {
        host.publish_catalog()?;
    }

    match run.await? {
        PhaseOutcome::Inert => {
            info!("No chrome-screenshot phase in location, nothing to do");
        }
        PhaseOutcome::Prepared { contexts } => {
            info!(
                "✅ Found {} screenshot contexts -> {}",
                contexts,
                sink.manifest_path().display()
            );
        }
        PhaseOutcome::Capturing(listener) => {
            let target = listener.target().clone();
            let mut status = sink.subscribe();

            let ready = tokio::time::timeout(args.ready_timeout, async {
                status
                    .wait_for(|s| matches!(s, SinkStatus::Ready { .. }))
                    .await
                    .is_ok()
            })
            .await;
            listener.stop();

            match ready {
                Ok(true) => info!("✅ {} is ready for capture", target),
                Ok(false) => bail!("Sink closed before {} became ready", target),
                Err(_) => bail!(
                    "{} did not become ready within {}s",
                    target,
                    args.ready_timeout.as_secs()
                ),
            }
        }
        PhaseOutcome::Failed => {
            return Err(match sink.status() {
                SinkStatus::Failed(message) => anyhow!(message),
                other => anyhow!("Screenshot phase failed ({:?})", other),
            });
        }
    }

    channel.close();
    Ok(())
}

fn list_stories(fixture: PathBuf) -> anyhow::Result<()> {
    let fixture = FixtureCatalog::load(&fixture)?;
    for story in fixture.story_catalog().walk() {
        println!("{}", story);
    }
    Ok(())
}
