//! tripmeter cli - Fare meter driven by position fixes

use std::fs::{self, File};
use std::io::BufReader as StdBufReader;
use std::io::BufWriter;
use std::time::Duration;

use argopt::{cmd_group, subcmd};
use csv::ReaderBuilder;
use time::format_description::well_known;
use time::macros::datetime;
use time::OffsetDateTime;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tripmeter::format::{format_distance, format_elapsed, format_fare, format_snapshot, format_tariff};
use tripmeter::sources::{
    parse_line, CsvSource, FixFeed, GpxSource, LineInput, MeterCommand, RecordedSource,
};
use tripmeter::{GpxGenerator, Meter, MeterConfig, TripReceipt, TripReplay};

/// CLI of tripmeter - Fare meter driven by live or recorded position fixes
#[cmd_group(commands = [quote, replay, live])]
fn main() -> Result<(), String> {}

/// Print the fare for a given running time and distance
#[subcmd]
fn quote(
    /// Running time in minutes
    minutes: f64,
    /// Traveled distance in kilometers
    km: f64,
    /// Meter configuration. Default: .tripmeter.yaml, ~/.tripmeter.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    if !minutes.is_finite() || minutes < 0.0 || !km.is_finite() || km < 0.0 {
        return Err("Minutes and kilometers must be non-negative numbers".to_string());
    }

    let conf = load_configs(config)?;
    let fare = conf
        .tariff
        .fare((minutes * 60_000.0).round() as u64, km * 1000.0);

    println!("{}", format_tariff(&conf.tariff, &conf.display.currency));
    println!("{}", format_fare(fare, &conf.display.currency));

    Ok(())
}

/// Re-rate a recorded trip log (CSV or GPX)
#[subcmd]
fn replay(
    /// Trip log path
    log: String,
    /// Log format: csv or gpx. Default: guessed from the extension
    #[opt(long)]
    format: Option<String>,
    /// Start time, RFC3339 format
    #[opt(long)]
    start: Option<String>,
    /// End time, RFC3339 format
    #[opt(long)]
    end: Option<String>,
    /// Write the trip route to this GPX file
    #[opt(long)]
    export: Option<String>,
    /// Meter configuration. Default: .tripmeter.yaml, ~/.tripmeter.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let start = parse_time(start, OffsetDateTime::UNIX_EPOCH)
        .map_err(|e| format!("Failed on parse the start time: {}", e))?;
    let end = parse_time(end, datetime!(9999-12-31 23:59:59 UTC))
        .map_err(|e| format!("Failed on parse the end time: {}", e))?;

    let conf = load_configs(config)?;

    let file = File::open(&log).map_err(|e| format!("Failed on open the trip log: {}", e))?;

    let fixes = match log_format(&log, format.as_deref())? {
        LogFormat::Csv => {
            let rdr = ReaderBuilder::new().flexible(true).from_reader(file);
            CsvSource::new(rdr, Some(conf.fields.clone())).fetch(start, end)
        }
        LogFormat::Gpx => GpxSource::new(StdBufReader::new(file)).fetch(start, end),
    }
    .map_err(|e| e.to_string())?;

    info!(fixes = fixes.len(), "Replaying trip log");

    let receipt = TripReplay::new(conf.tariff)
        .max_gap(conf.replay.max_gap_secs)
        .run(fixes)
        .ok_or("No positions found in the period")?;

    print_receipt(&receipt, &conf.display.currency);

    if let Some(destination) = export {
        let destination = File::create(destination)
            .map_err(|e| format!("Failed on create the destination file: {}", e))?;

        GpxGenerator::from_receipt(&receipt).write(BufWriter::new(destination))?;
    }

    Ok(())
}

/// Run the live meter reading stdin: `lat,lng[,speed]` fixes or start/pause/resume/stop
#[subcmd]
fn live(
    /// Meter configuration. Default: .tripmeter.yaml, ~/.tripmeter.yaml
    #[opt(long)]
    config: Option<String>,
) -> Result<(), String> {
    init_logging();

    let conf = load_configs(config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed on start the runtime: {}", e))?;

    runtime.block_on(run_live(conf))
}

async fn run_live(conf: MeterConfig) -> Result<(), String> {
    let currency = conf.display.currency.clone();
    let (feed, publisher) = FixFeed::channel(64);

    let mut meter = Meter::new(feed, conf.tariff);
    meter
        .tick_interval(Duration::from_millis(conf.clock.tick_interval_ms))
        .on_start(|| eprintln!("\x07meter started"))
        .on_pause(|| eprintln!("\x07meter paused"))
        .on_stop(|| eprintln!("\x07meter stopped"));

    println!("{}", format_tariff(&conf.tariff, &currency));

    let mut updates = meter.subscribe();
    let display_currency = currency.clone();
    let display = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let line = format_snapshot(&updates.borrow_and_update(), &display_currency);
            println!("{}", line);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| format!("Failed on read stdin: {}", e))?
    {
        match parse_line(&line) {
            Ok(LineInput::Fix(fix)) => {
                publisher.publish(fix);
            }
            Ok(LineInput::Command(MeterCommand::Start)) => {
                meter.start();
            }
            Ok(LineInput::Command(MeterCommand::Pause)) => {
                meter.pause();
            }
            Ok(LineInput::Command(MeterCommand::Stop)) => {
                if let Some(receipt) = meter.stop() {
                    print_receipt(&receipt, &currency);
                }
            }
            Ok(LineInput::Blank) => {}
            Err(error) => warn!(%error, "Ignoring input line"),
        }
    }

    if let Some(receipt) = meter.stop() {
        print_receipt(&receipt, &currency);
    }

    display.abort();

    Ok(())
}

fn print_receipt(receipt: &TripReceipt, currency: &str) {
    let stamp = |t: OffsetDateTime| t.format(&well_known::Rfc3339).unwrap_or_default();

    println!("started  {}", stamp(receipt.started_at));
    println!("ended    {}", stamp(receipt.ended_at));
    println!("time     {}", format_elapsed(receipt.elapsed_millis));
    println!("distance {}", format_distance(receipt.total_distance_meters));
    println!("tariff   {}", format_tariff(&receipt.tariff, currency));
    println!("fare     {}", format_fare(receipt.fare, currency));
}

#[derive(Debug, PartialEq)]
enum LogFormat {
    Csv,
    Gpx,
}

fn log_format(path: &str, provided: Option<&str>) -> Result<LogFormat, String> {
    let name = match provided {
        Some(f) => f.to_lowercase(),
        None if path.to_lowercase().ends_with(".gpx") => "gpx".to_string(),
        None => "csv".to_string(),
    };

    match name.as_str() {
        "csv" => Ok(LogFormat::Csv),
        "gpx" => Ok(LogFormat::Gpx),
        other => Err(format!("Unsupported log format `{}`", other)),
    }
}

fn parse_time(raw: Option<String>, default: OffsetDateTime) -> Result<OffsetDateTime, String> {
    match raw {
        Some(s) => OffsetDateTime::parse(&s, &well_known::Rfc3339).map_err(|e| e.to_string()),
        None => Ok(default),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the current config.
///
/// An explicitly provided file must exist and be valid; the implicit
/// lookups fall back to the defaults.
fn load_configs(provided: Option<String>) -> Result<MeterConfig, String> {
    if let Some(sprovided) = provided {
        return load_config_file(&sprovided);
    }

    let mut options = vec![".tripmeter.yaml".to_string()];

    if let Some(home) = dirs::home_dir() {
        if let Some(shome) = home.to_str() {
            options.push(format!("{}/.tripmeter.yaml", shome));
        }
    }

    for fi in options {
        if let Ok(s) = fs::read_to_string(&fi) {
            match MeterConfig::from_yaml(&s) {
                Ok(conf) => return Ok(conf),
                Err(error) => {
                    warn!(file = %fi, %error, "Ignoring invalid configuration");
                    break;
                }
            }
        }
    }

    Ok(MeterConfig::default())
}

fn load_config_file(path: &str) -> Result<MeterConfig, String> {
    let s = fs::read_to_string(path)
        .map_err(|e| format!("Failed on read the config `{}`: {}", path, e))?;

    MeterConfig::from_yaml(&s).map_err(|e| format!("Invalid config `{}`: {}", path, e))
}

#[test]
fn pick_log_format() {
    assert_eq!(Ok(LogFormat::Gpx), log_format("trip.GPX", None));
    assert_eq!(Ok(LogFormat::Csv), log_format("trip.log", None));
    assert_eq!(Ok(LogFormat::Csv), log_format("trip.gpx", Some("CSV")));
    assert!(log_format("trip.gpx", Some("kml")).is_err());
}

#[test]
fn explicit_config_must_load() -> Result<(), String> {
    let dir = std::env::temp_dir().join(format!("tripmeter-config-{}", std::process::id()));
    fs::create_dir_all(&dir).map_err(|e| e.to_string())?;

    let missing = dir.join("missing.yaml");
    assert!(load_configs(Some(missing.to_string_lossy().to_string())).is_err());

    let invalid = dir.join("invalid.yaml");
    fs::write(&invalid, "tariff:\n  per_minute_rate: -50\n").map_err(|e| e.to_string())?;
    assert!(load_configs(Some(invalid.to_string_lossy().to_string())).is_err());

    let valid = dir.join("valid.yaml");
    fs::write(&valid, "tariff:\n  base_fare: 700\n").map_err(|e| e.to_string())?;
    let conf = load_configs(Some(valid.to_string_lossy().to_string()))?;
    assert_eq!(700.0, conf.tariff.base_fare);

    fs::remove_dir_all(&dir).map_err(|e| e.to_string())?;

    Ok(())
}

#[test]
fn parse_optional_time() -> Result<(), String> {
    let default = OffsetDateTime::UNIX_EPOCH;

    assert_eq!(default, parse_time(None, default)?);
    assert_eq!(
        datetime!(2019-10-01 0:01 UTC),
        parse_time(Some("2019-10-01T00:01:00Z".to_string()), default)?
    );
    assert!(parse_time(Some("yesterday".to_string()), default).is_err());

    Ok(())
}
