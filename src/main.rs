use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use nimbus_core::{App, Config, LocationSourceKind, TemperatureUnit};
use nimbus_weather::{
    ConnectivityEvent, Coordinates, DisplayState, FileStore, IpLocationSource, LocationResolver,
    LocationSource, NoLocationSource, RefreshOrchestrator, ReverseGeocoder, SnapshotCache,
    StaticLocationSource, SystemClock, Trigger, WeatherDisplay, WeatherProvider,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, Interval};

mod terminal;

use terminal::TerminalDisplay;

#[derive(Parser, Debug)]
#[command(name = "nimbus")]
#[command(about = "Current weather that stays usable offline")]
struct Cli {
    /// Path to config.toml (default: <config dir>/nimbus/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep running: read commands from stdin and refresh on a timer
    #[arg(long)]
    watch: bool,

    /// Latitude override (decimal). Example: 44.31
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude override (decimal). Example: -69.78
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    /// Temperature unit override
    #[arg(long, value_enum)]
    units: Option<UnitArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum UnitArg {
    Auto,
    Celsius,
    Fahrenheit,
}

impl From<UnitArg> for TemperatureUnit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Auto => TemperatureUnit::Auto,
            UnitArg::Celsius => TemperatureUnit::Celsius,
            UnitArg::Fahrenheit => TemperatureUnit::Fahrenheit,
        }
    }
}

/// A line typed in watch mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Trigger(Trigger),
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "refresh" => Some(Command::Trigger(Trigger::Refresh)),
        "retry" => Some(Command::Trigger(Trigger::Retry)),
        "online" => Some(Command::Trigger(Trigger::Connectivity(
            ConnectivityEvent::Online,
        ))),
        "offline" => Some(Command::Trigger(Trigger::Connectivity(
            ConnectivityEvent::Offline,
        ))),
        "h" | "help" | "?" => Some(Command::Help),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

const HELP: &str = "Commands: refresh (r), retry, online, offline, help (h), quit (q)";

fn build_orchestrator(
    config: &Config,
    cli: &Cli,
    display: Arc<dyn WeatherDisplay>,
) -> Result<RefreshOrchestrator> {
    let location = &config.location;
    let default = Coordinates::new(location.default_latitude, location.default_longitude);

    let source: Arc<dyn LocationSource> = match (cli.lat, cli.lon) {
        (Some(lat), Some(lon)) => Arc::new(StaticLocationSource(Coordinates::new(lat, lon))),
        _ => match location.source {
            LocationSourceKind::None => Arc::new(NoLocationSource),
            LocationSourceKind::Ip => Arc::new(IpLocationSource::new(&location.ip_lookup_url)?),
        },
    };

    let unit = cli
        .units
        .map(TemperatureUnit::from)
        .unwrap_or(config.weather.temperature_unit);

    let provider = WeatherProvider::new(
        &config.weather.api_base_url,
        unit,
        Duration::from_secs(config.weather.request_timeout_secs),
    )?;

    let namer = ReverseGeocoder::new(&location.geocode_url, default, &location.default_label)?;

    let cache = SnapshotCache::new(
        Arc::new(FileStore::new(&config.config_dir)),
        Duration::from_secs(config.weather.cache_ttl_secs),
    );

    Ok(RefreshOrchestrator::new(
        LocationResolver::new(source, default, Duration::from_millis(location.timeout_ms)),
        Arc::new(provider),
        Arc::new(namer),
        cache,
        Arc::new(SystemClock),
        display,
    ))
}

/// Load once and wait for any background refresh. Returns false when
/// nothing could be shown.
async fn run_once(orchestrator: &RefreshOrchestrator) -> bool {
    let outcome = orchestrator.load_weather().await;

    if let Some(background) = outcome.background {
        if let Err(e) = background.await {
            tracing::warn!("Background refresh task failed: {}", e);
        }
    }

    outcome.state != DisplayState::ErrorNoData
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_watch(orchestrator: &RefreshOrchestrator, refresh_minutes: u32) -> Result<()> {
    let mut ticker = (refresh_minutes > 0).then(|| {
        let period = Duration::from_secs(u64::from(refresh_minutes) * 60);
        tokio::time::interval_at(Instant::now() + period, period)
    });
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);
    orchestrator.dispatch(Trigger::Initial);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(Command::Trigger(trigger)) => {
                        orchestrator.dispatch(trigger);
                    }
                    Some(Command::Help) => println!("{}", HELP),
                    Some(Command::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => println!("Unknown command: {}. {}", line.trim(), HELP),
                }
            }
            _ = next_tick(&mut ticker) => {
                tracing::debug!("Scheduled refresh");
                orchestrator.dispatch(Trigger::Scheduled);
            }
        }
    }

    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    nimbus_core::init();
    let cli = Cli::parse();

    let app = App::new(cli.config.as_deref())?;
    tracing::info!("Using data directory {}", app.data_dir().display());

    let display = Arc::new(TerminalDisplay::new());
    let orchestrator = build_orchestrator(app.config(), &cli, display)?;

    let succeeded = if cli.watch {
        run_watch(&orchestrator, app.config().weather.refresh_minutes).await?;
        true
    } else {
        run_once(&orchestrator).await
    };

    app.shutdown();

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command("r"),
            Some(Command::Trigger(Trigger::Refresh))
        );
        assert_eq!(
            parse_command("  RETRY \n"),
            Some(Command::Trigger(Trigger::Retry))
        );
        assert_eq!(
            parse_command("offline"),
            Some(Command::Trigger(Trigger::Connectivity(
                ConnectivityEvent::Offline
            )))
        );
        assert_eq!(parse_command("q"), Some(Command::Quit));
        assert_eq!(parse_command("?"), Some(Command::Help));
        assert_eq!(parse_command("bogus"), None);
    }

    #[test]
    fn test_cli_requires_both_coordinates() {
        assert!(Cli::try_parse_from(["nimbus", "--lat", "44.31"]).is_err());

        let cli = Cli::try_parse_from(["nimbus", "--lat", "44.31", "--lon", "-69.78"]).unwrap();
        assert_eq!(cli.lon, Some(-69.78));
        assert!(!cli.watch);
    }

    #[tokio::test]
    async fn test_build_orchestrator_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.config_dir = dir.path().to_path_buf();
        config.location.source = LocationSourceKind::None;
        let cli = Cli::try_parse_from(["nimbus", "--units", "fahrenheit"]).unwrap();

        let orchestrator =
            build_orchestrator(&config, &cli, Arc::new(TerminalDisplay::new())).unwrap();

        assert_eq!(orchestrator.state(), DisplayState::Idle);
    }
}
