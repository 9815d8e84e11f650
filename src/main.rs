use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use plansim::api::{config_from_json, run_http_server};
use plansim::client::{HttpSimulationService, SimulationService};
use plansim::core::DisplayUnits;
use plansim::session::{Orchestrator, SessionStore, SubmissionOutcome, ViewBinder};
use plansim::settings::ServiceSettings;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliUnits {
    Nominal,
    Real,
}

impl From<CliUnits> for DisplayUnits {
    fn from(value: CliUnits) -> Self {
        match value {
            CliUnits::Nominal => DisplayUnits::Nominal,
            CliUnits::Real => DisplayUnits::Real,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "plansim",
    version,
    about = "Investment projection session host backed by a remote simulation service"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the session over HTTP.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[command(flatten)]
        service: ServiceSettings,
    },
    /// Submit one configuration and print the derived views as JSON.
    Run {
        #[arg(long, help = "Configuration JSON file (form keys); defaults when omitted")]
        config: Option<PathBuf>,
        #[arg(long, value_enum, default_value = "real")]
        units: CliUnits,
        #[command(flatten)]
        service: ServiceSettings,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Serve { port, service } => {
            let service = HttpSimulationService::new(service)?;
            run_http_server(port, Arc::new(service))
                .await
                .context("HTTP server failed")
        }
        Command::Run {
            config,
            units,
            service,
        } => run_once(config, units.into(), service).await,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("plansim=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_once(
    config_path: Option<PathBuf>,
    units: DisplayUnits,
    settings: ServiceSettings,
) -> Result<()> {
    let json = match &config_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => "{}".to_string(),
    };
    let config = config_from_json(&json).map_err(anyhow::Error::msg)?;

    let service: Arc<dyn SimulationService> = Arc::new(HttpSimulationService::new(settings)?);
    let store = SessionStore::new();
    store.set_units(units);
    let mut binder = ViewBinder::new(store.reader());
    let orchestrator = Orchestrator::new(service, store);

    match orchestrator.submit(config).await? {
        SubmissionOutcome::Complete { .. } => {}
        SubmissionOutcome::Superseded { .. } => anyhow::bail!("submission was superseded"),
    }

    binder.refresh();
    let views = match binder.views() {
        Some(Ok(views)) => views,
        Some(Err(err)) => return Err(err.clone().into()),
        None => anyhow::bail!("no result was published"),
    };
    println!("{}", serde_json::to_string_pretty(views.as_ref())?);
    Ok(())
}
