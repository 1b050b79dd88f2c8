use std::io::Write;

use anyhow::Context;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use weatherdesk::config::DEFAULT_BASE_URL;
use weatherdesk::data::{
    format_pop, format_symbol, format_temp, format_timestamp, format_visibility, wind_direction,
    DetailedReport, ForecastPoint, HourlyPoint, UvBand, WeatherSnapshot,
};
use weatherdesk::state::DashboardState;
use weatherdesk::table::Table;
use weatherdesk::{Config, WeatherAggregator, WeatherError};

/// Hourly rows shown in a search report.
const HOURLY_ROWS: usize = 12;

/// Forecast slices shown per city on the dashboard.
const DASHBOARD_SLICES: usize = 4;

#[derive(Parser)]
#[command(name = "weatherdesk")]
#[command(about = "City weather and a dashboard of tracked cities")]
#[command(arg_required_else_help = true)]
struct Cli {
    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Base URL of the weather API
    #[arg(long, env = "WEATHERDESK_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Timezone for displayed times, e.g. Europe/London (default: system local time)
    #[arg(long, value_parser = parse_tz, global = true)]
    tz: Option<Tz>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch current weather for a city
    Current {
        /// City name, e.g. "London" or "Paris, FR"
        city: String,

        /// Output raw JSON instead of formatted table
        #[arg(long)]
        json: bool,
    },
    /// Fetch current weather, forecast, air quality, UV index and alerts for a city
    Search {
        /// City name, e.g. "London" or "Paris, FR"
        city: String,

        /// Output raw JSON instead of formatted tables
        #[arg(long)]
        json: bool,
    },
    /// Interactive session with search history and tracked cities
    Dashboard,
}

/// Commands accepted inside a dashboard session.
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
enum SessionCommand {
    /// Search a city and show its report
    Search {
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },
    /// Add the last search result to the dashboard
    Add,
    /// Look up a city and add it to the dashboard
    Track {
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },
    /// Remove a city from the dashboard (exact name)
    Remove {
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },
    /// Show tracked cities
    List,
    /// Show recent searches
    History,
    /// Repeat a recent search by its number in `history`
    Again { n: usize },
    /// Leave the session
    #[command(alias = "exit")]
    Quit,
}

fn parse_tz(s: &str) -> Result<Tz, String> {
    s.parse::<Tz>().map_err(|e| e.to_string())
}

/// Where epoch timestamps are rendered.
#[derive(Debug, Clone, Copy)]
enum DisplayZone {
    Local,
    Named(Tz),
}

impl DisplayZone {
    fn format(self, epoch: i64, fmt: &str) -> String {
        match self {
            DisplayZone::Local => format_timestamp(epoch, &chrono::Local, fmt),
            DisplayZone::Named(tz) => format_timestamp(epoch, &tz, fmt),
        }
    }
}

/// Dedup consecutive identical values, replacing duplicates with empty strings
/// e.g. `dedup(["foo", "foo", "foo", "bar", "bar", "baz"]) == ["foo", "", "", "bar", "", "baz"]`.
fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    items
        .into_iter()
        .chunk_by(|item| item.clone())
        .into_iter()
        .flat_map(|(key, group)| {
            std::iter::once(key).chain(std::iter::repeat_n(String::new(), group.count() - 1))
        })
        .collect()
}

/// Wrap a library error so `main` prints the user-facing message first.
fn user_facing(err: WeatherError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

/// One table cell per item.
fn cells<T>(items: &[T], f: impl Fn(&T) -> String) -> Vec<String> {
    items.iter().map(f).collect()
}

fn snapshot_table(snapshots: &[&WeatherSnapshot], zone: DisplayZone) -> Table {
    Table::new()
        .text_column("City", cells(snapshots, |s| format!("{}, {}", s.name, s.country)))
        .column("", cells(snapshots, |s| s.condition.symbol()))
        .column("Temp", cells(snapshots, |s| format_temp(s.temp)))
        .column("Feels", cells(snapshots, |s| format_temp(s.feels_like)))
        .column(
            "High/Low",
            cells(snapshots, |s| {
                format!("{}/{}", format_temp(s.temp_max), format_temp(s.temp_min))
            }),
        )
        .column("Humidity", cells(snapshots, |s| format!("{}%", s.humidity)))
        .column(
            "Wind",
            cells(snapshots, |s| {
                format!("{:.1} m/s {}", s.wind_speed, wind_direction(s.wind_deg))
            }),
        )
        .column("Pressure", cells(snapshots, |s| format!("{} hPa", s.pressure)))
        .column("Visibility", cells(snapshots, |s| format_visibility(s.visibility)))
        .column("Sunrise", cells(snapshots, |s| zone.format(s.sunrise, "%H:%M")))
        .column("Sunset", cells(snapshots, |s| zone.format(s.sunset, "%H:%M")))
}

fn hourly_table(hourly: &[HourlyPoint], zone: DisplayZone) -> Table {
    Table::new()
        .group("Next hours")
        .column("Hour", hourly.iter().map(|h| zone.format(h.dt, "%Hh")).collect())
        .column(
            "",
            hourly
                .iter()
                .map(|h| format_symbol(h.condition.as_ref()))
                .collect(),
        )
        .column("Temp", hourly.iter().map(|h| format_temp(h.temp)).collect())
        .column("Rain", hourly.iter().map(|h| format_pop(h.pop)).collect())
}

/// Build a table of forecast slices with Date and Hour columns on the left. Dates are
/// deduped so only the first row of each day shows the date.
fn forecast_table(forecast: &[ForecastPoint], zone: DisplayZone) -> Table {
    let dates = dedup(forecast.iter().map(|p| zone.format(p.dt, "%Y-%m-%d")));
    let hours = forecast.iter().map(|p| zone.format(p.dt, "%Hh")).collect();

    Table::new()
        .group("Forecast")
        .column("Date", dates)
        .column("Hour", hours)
        .column(
            "",
            forecast
                .iter()
                .map(|p| format_symbol(p.condition.as_ref()))
                .collect(),
        )
        .column("Temp", forecast.iter().map(|p| format_temp(p.temp)).collect())
}

/// Tracked cities with current conditions and the first few cached forecast slices.
fn dashboard_table(state: &DashboardState, zone: DisplayZone) -> Table {
    let tracked = state.tracked.iter().collect_vec();

    let mut table = Table::new()
        .text_column(
            "City",
            tracked
                .iter()
                .map(|s| format!("{}, {}", s.name, s.country))
                .collect(),
        )
        .group("Now")
        .column("", tracked.iter().map(|s| s.condition.symbol()).collect())
        .column("Temp", tracked.iter().map(|s| format_temp(s.temp)).collect())
        .column(
            "Hum",
            tracked.iter().map(|s| format!("{}%", s.humidity)).collect(),
        )
        .column(
            "Wind",
            tracked
                .iter()
                .map(|s| format!("{:.1} m/s", s.wind_speed))
                .collect(),
        )
        .group("Coming up");

    for slot in 0..DASHBOARD_SLICES {
        let cells = tracked
            .iter()
            .map(|s| {
                state
                    .forecasts
                    .get(&s.name)
                    .and_then(|points| points.get(slot))
                    .map(|p| format!("{} {}", zone.format(p.dt, "%Hh"), format_temp(p.temp)))
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        table = table.column("", cells);
    }
    table
}

fn print_report(report: &DetailedReport, zone: DisplayZone, verbose: bool) {
    let snapshot = &report.snapshot;
    println!(
        "Weather for {}, {}: {}",
        snapshot.name, snapshot.country, snapshot.condition.description
    );
    if verbose {
        println!("Location: {}", snapshot.coord.link());
        println!("Icon: {}", snapshot.condition.icon_url());
    }
    print!("{}", snapshot_table(&[snapshot], zone));

    if !report.alerts.is_empty() {
        println!();
        println!("Alerts:");
        for alert in &report.alerts {
            if alert.sender.is_empty() {
                println!("  {}", alert.event);
            } else {
                println!("  {} ({})", alert.event, alert.sender);
            }
            println!(
                "    {} - {}",
                zone.format(alert.start, "%Y-%m-%d %H:%M"),
                zone.format(alert.end, "%Y-%m-%d %H:%M")
            );
            for line in alert.description.lines() {
                println!("    {}", line);
            }
        }
    }

    if let Some(aq) = &report.air_quality {
        let c = &aq.components;
        println!();
        println!("Air quality: {} (index {})", aq.description(), aq.aqi);
        println!(
            "  CO {:.2}  NO2 {:.2}  O3 {:.2}  PM2.5 {:.2}  PM10 {:.2}  µg/m³",
            c.co, c.no2, c.o3, c.pm2_5, c.pm10
        );
    }

    if let Some(uvi) = report.uv_index {
        let band = UvBand::from_index(uvi);
        println!("UV index: {:.1} {} ({})", uvi, band.description(), band.advice());
    }

    if !report.hourly.is_empty() {
        println!();
        let shown = &report.hourly[..report.hourly.len().min(HOURLY_ROWS)];
        print!("{}", hourly_table(shown, zone));
    }

    if !report.forecast.is_empty() {
        println!();
        print!("{}", forecast_table(&report.forecast, zone));
    }
}

/// Handle the `current` subcommand: fetch and display current weather for one city.
async fn do_current(
    aggregator: &WeatherAggregator,
    city: &str,
    json: bool,
    zone: DisplayZone,
    verbose: bool,
) -> anyhow::Result<()> {
    let snapshot = aggregator.fetch_current(city).await.map_err(user_facing)?;

    if json {
        println!("{}", serde_json::to_string(&snapshot)?);
        return Ok(());
    }
    println!("Current weather for {}, {}", snapshot.name, snapshot.country);
    if verbose {
        println!("Location: {}", snapshot.coord.link());
    }
    print!("{}", snapshot_table(&[&snapshot], zone));
    Ok(())
}

/// Handle the `search` subcommand: fetch everything about a city and display it.
async fn do_search(
    aggregator: &WeatherAggregator,
    city: &str,
    json: bool,
    zone: DisplayZone,
    verbose: bool,
) -> anyhow::Result<()> {
    let report = aggregator.fetch_detailed(city).await.map_err(user_facing)?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
        return Ok(());
    }
    print_report(&report, zone, verbose);
    Ok(())
}

/// Run one session command. Returns `false` when the session should end.
async fn run_session_command(
    aggregator: &WeatherAggregator,
    command: SessionCommand,
    zone: DisplayZone,
    verbose: bool,
) -> bool {
    let search = |city: String| async move {
        match aggregator.fetch_detailed(&city).await {
            Ok(report) => print_report(&report, zone, verbose),
            Err(e) => println!("{}", e.user_message()),
        }
    };

    match command {
        SessionCommand::Search { city } => search(city.join(" ")).await,
        SessionCommand::Again { n } => {
            let entry = n
                .checked_sub(1)
                .and_then(|idx| aggregator.state().history.get(idx).map(str::to_string));
            match entry {
                Some(city) => search(city).await,
                None => println!("No search #{n} in history."),
            }
        }
        SessionCommand::Add => match aggregator.state().view {
            Some(report) => track(aggregator, report.snapshot),
            None => println!("Nothing to add; search for a city first."),
        },
        SessionCommand::Track { city } => match aggregator.fetch_current(&city.join(" ")).await {
            Ok(snapshot) => track(aggregator, snapshot),
            Err(e) => println!("{}", e.user_message()),
        },
        SessionCommand::Remove { city } => {
            let city = city.join(" ");
            if aggregator.state().tracked.iter().any(|s| s.name == city) {
                aggregator.remove_tracked(&city);
                println!("Removed {city}.");
            } else {
                println!("{city} is not on the dashboard.");
            }
        }
        SessionCommand::List => {
            let state = aggregator.state();
            if state.tracked.is_empty() {
                println!("No tracked cities.");
            } else {
                print!("{}", dashboard_table(&state, zone));
            }
        }
        SessionCommand::History => {
            let state = aggregator.state();
            if state.history.is_empty() {
                println!("No recent searches.");
            }
            for (i, city) in state.history.entries().iter().enumerate() {
                println!("{:>2}. {}", i + 1, city);
            }
        }
        SessionCommand::Quit => return false,
    }
    true
}

fn track(aggregator: &WeatherAggregator, snapshot: WeatherSnapshot) {
    let name = snapshot.name.clone();
    // The refresh handle is dropped on purpose: the forecast shows up in a later `list`.
    match aggregator.add_tracked(snapshot) {
        Some(_) => println!("Added {name} to the dashboard."),
        None => println!("{name} is already on the dashboard."),
    }
}

/// Handle the `dashboard` subcommand: read session commands from stdin until EOF or `quit`.
async fn do_dashboard(
    aggregator: &WeatherAggregator,
    zone: DisplayZone,
    verbose: bool,
) -> anyhow::Result<()> {
    println!("Dashboard session. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await.context("failed to read command")? else {
            break;
        };
        let words = line.split_whitespace().collect_vec();
        if words.is_empty() {
            continue;
        }
        let command = match SessionLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                e.print()?;
                continue;
            }
        };
        if !run_session_command(aggregator, command, zone, verbose).await {
            break;
        }
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "weatherdesk=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::new(cli.api_key).with_base_url(cli.base_url);
    let aggregator = WeatherAggregator::new(config);
    let zone = cli.tz.map_or(DisplayZone::Local, DisplayZone::Named);

    match cli.command {
        Command::Current { city, json } => {
            do_current(&aggregator, &city, json, zone, cli.verbose).await
        }
        Command::Search { city, json } => {
            do_search(&aggregator, &city, json, zone, cli.verbose).await
        }
        Command::Dashboard => do_dashboard(&aggregator, zone, cli.verbose).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weatherdesk::data::{Condition, Coord};

    fn parse(line: &str) -> Result<SessionCommand, clap::Error> {
        SessionLine::try_parse_from(line.split_whitespace()).map(|l| l.command)
    }

    fn snapshot(name: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            name: name.to_string(),
            country: "NO".to_string(),
            coord: Coord { lat: 59.9, lon: 10.7 },
            temp: -3.6,
            feels_like: -8.,
            temp_min: -5.,
            temp_max: -2.,
            humidity: 80,
            pressure: 1020,
            visibility: 10000,
            wind_speed: 4.,
            wind_deg: 180.,
            sunrise: 0,
            sunset: 0,
            condition: Condition {
                id: 600,
                main: "Snow".into(),
                description: "light snow".into(),
                icon: "13d".into(),
            },
        }
    }

    #[test]
    fn dedup_consecutive() {
        let items = ["foo", "foo", "foo", "bar", "bar", "baz"].map(String::from);
        assert_eq!(dedup(items), ["foo", "", "", "bar", "", "baz"]);
    }

    #[test]
    fn session_multiword_city() {
        assert_eq!(
            parse("search New York").unwrap(),
            SessionCommand::Search {
                city: vec!["New".into(), "York".into()]
            }
        );
        assert_eq!(
            parse("remove St. Louis").unwrap(),
            SessionCommand::Remove {
                city: vec!["St.".into(), "Louis".into()]
            }
        );
    }

    #[test]
    fn session_simple_commands() {
        assert_eq!(parse("add").unwrap(), SessionCommand::Add);
        assert_eq!(parse("list").unwrap(), SessionCommand::List);
        assert_eq!(parse("exit").unwrap(), SessionCommand::Quit);
        assert_eq!(parse("again 2").unwrap(), SessionCommand::Again { n: 2 });
    }

    #[test]
    fn session_rejects_bad_input() {
        assert!(parse("search").is_err());
        assert!(parse("again two").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn dashboard_without_cached_forecast_shows_dashes() {
        let state = DashboardState::default().tracking(snapshot("Oslo"));
        let rendered = dashboard_table(&state, DisplayZone::Named(chrono_tz::UTC)).to_string();
        let lines = rendered.lines().collect_vec();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("Oslo, NO"));
        assert!(lines[2].contains("-4°"));
        assert!(lines[2].trim_end().ends_with('-'));
    }

    #[test]
    fn dashboard_shows_cached_slices() {
        let points = (0..8)
            .map(|i| ForecastPoint {
                dt: 1_736_942_400 + i * 3 * 3600,
                temp: i as f64,
                condition: None,
            })
            .collect();
        let state = DashboardState::default()
            .tracking(snapshot("Oslo"))
            .with_forecast("Oslo", points);
        let rendered = dashboard_table(&state, DisplayZone::Named(chrono_tz::UTC)).to_string();
        let row = rendered.lines().nth(2).unwrap();
        assert!(row.contains("12h 0°"));
        assert!(row.contains("21h 3°"));
        assert!(!row.contains("00h 4°"));
    }

    #[test]
    fn forecast_dates_are_deduped() {
        let points = (0..3)
            .map(|i| ForecastPoint {
                dt: 1_736_942_400 + i * 3 * 3600,
                temp: 1.,
                condition: None,
            })
            .collect_vec();
        let rendered = forecast_table(&points, DisplayZone::Named(chrono_tz::UTC)).to_string();
        assert_eq!(rendered.matches("2025-01-15").count(), 1);
    }
}
