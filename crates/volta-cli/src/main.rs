use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::time::{interval_at, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use volta_core::{
    ClientConfig, Explorer, HttpVoltaApi, Level, Preselect, StationStatus, WatchEvent, WatchToggle,
};

mod report;
mod viewer;

#[derive(Debug, Parser)]
#[command(name = "voltaplus")]
#[command(about = "Volta charging network browser and station watch")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value = "https://voltaplus.azurewebsites.net")]
    api_url: String,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 60)]
    watch_interval_secs: u64,

    /// Pre-select a state by display text (case-insensitive).
    #[arg(long)]
    state: Option<String>,

    /// Pre-select a city.
    #[arg(long)]
    city: Option<String>,

    /// Pre-select a site.
    #[arg(long)]
    site: Option<String>,

    /// Pre-select a station.
    #[arg(long)]
    station: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the state/city/site/station hierarchy.
    Sites {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Fetch the selected station's meter statuses once.
    Status {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
    /// Poll the selected station until a meter becomes available.
    Watch,
    /// Browse the network interactively.
    View,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = ClientConfig {
        api_url: cli.api_url.clone(),
        request_timeout: Duration::from_millis(cli.timeout_ms),
        watch_interval: Duration::from_secs(cli.watch_interval_secs),
    };
    let requested = Preselect {
        state: cli.state.clone(),
        city: cli.city.clone(),
        site: cli.site.clone(),
        station: cli.station.clone(),
    };

    let api = HttpVoltaApi::from_config(&config)?;
    let mut explorer = Explorer::new(api, &config);

    let missed = explorer.load_catalog(&requested).await?;
    for (level, value) in &missed {
        warn!(%level, value = value.as_str(), "pre-selection matched no option");
    }

    match cli.command {
        Command::Sites { format } => {
            let catalog = explorer
                .catalog()
                .ok_or_else(|| anyhow!("site catalog not loaded"))?;
            match format {
                OutputFormat::Human => print!("{}", report::render_hierarchy(catalog)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(catalog)?),
            }
        }
        Command::Status { format } => {
            let station = require_station(&explorer)?;
            match format {
                OutputFormat::Human => print!("{}", report::render_station(station)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(station)?),
            }
        }
        Command::Watch => watch_loop(&mut explorer).await?,
        Command::View => viewer::run_viewer(&mut explorer).await?,
    }

    Ok(())
}

/// The one-shot commands need the pre-selection flags to resolve all the
/// way down to a station; point at the first unresolved level otherwise.
fn require_station(explorer: &Explorer<HttpVoltaApi>) -> Result<&StationStatus> {
    if explorer.selection().station().is_none() {
        let catalog = explorer
            .catalog()
            .ok_or_else(|| anyhow!("site catalog not loaded"))?;
        for level in Level::ALL {
            if explorer.selection().get(level).is_none() {
                let options = explorer.selection().options(catalog, level);
                bail!(
                    "no {level} selected; pass --{level} with one of: {}",
                    options.join(", ")
                );
            }
        }
    }
    explorer
        .station_status()
        .ok_or_else(|| anyhow!("no meter data loaded for the selected station"))
}

async fn watch_loop(explorer: &mut Explorer<HttpVoltaApi>) -> Result<()> {
    let station = require_station(explorer)?.name.clone();

    let (toggle, event) = explorer.toggle_watch(std::time::Instant::now()).await?;
    if toggle == WatchToggle::Rejected {
        println!("a meter is free at {station} right now; nothing to watch");
        return Ok(());
    }
    if let Some(WatchEvent::StationFreed { station }) = event {
        println!("meter is now available at {station}");
        return Ok(());
    }

    if let Some(status) = explorer.station_status() {
        print!("{}", report::render_station(status));
    }

    let interval = explorer.watch().interval();
    info!(
        station = %station,
        interval_secs = interval.as_secs(),
        "watching until a meter frees up"
    );

    let mut ticker = interval_at(Instant::now() + interval, interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping watch");
                break;
            }
            _ = ticker.tick() => {
                match explorer.poll_watch(std::time::Instant::now()).await {
                    Ok(Some(WatchEvent::StationFreed { station })) => {
                        println!("meter is now available at {station}");
                        break;
                    }
                    Ok(None) => {
                        if let Some(status) = explorer.station_status() {
                            print!("{}", report::render_station(status));
                        }
                    }
                    Err(err) => warn!(error = %err, "watch poll failed"),
                }
            }
        }
    }

    Ok(())
}
