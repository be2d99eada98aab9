use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use plcwatch::data::duration::parse_duration;
use plcwatch::{
    format_duration, load_status_logs, App, FileSource, FleetData, Period, SampleSource, Settings,
    StoppageQuery, StoppageReport, StreamSource,
};
use plcwatch_sdk::{current_timestamp_ms, Output};

#[derive(Parser, Debug)]
#[command(name = "plcwatch")]
#[command(about = "Machine liveness and stoppage history for PLC telemetry feeds")]
struct Args {
    /// Telemetry export to read (JSON array or one record per line)
    #[arg(short, long, conflicts_with = "connect")]
    file: Option<PathBuf>,

    /// Connect to a collector streaming NDJSON telemetry (host:port)
    #[arg(short, long, conflicts_with = "file")]
    connect: Option<String>,

    /// Stored status logs to reconstruct stoppage history from
    #[arg(short, long)]
    status_logs: Option<PathBuf>,

    /// Settings file (TOML); PLCWATCH_* environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stoppage history period
    #[arg(short, long, value_enum, default_value_t = Period::Daily)]
    period: Period,

    /// Only show this machine (brand_model key or bare brand)
    #[arg(short, long)]
    machine: Option<String>,

    /// Stoppage page to show (1-based)
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Stoppage rows per page
    #[arg(long)]
    limit: Option<usize>,

    /// Keep polling the source and reprint every refresh interval
    #[arg(short, long)]
    watch: bool,

    /// Refresh interval in seconds (used with --watch)
    #[arg(short, long, default_value = "1")]
    refresh: u64,

    /// Idle threshold (e.g., "20s", "500ms")
    #[arg(long)]
    idle_after: Option<String>,

    /// Stopped threshold (e.g., "30s", "1m")
    #[arg(long)]
    stopped_after: Option<String>,

    /// Also log raw plc_running flips as a second provenance
    #[arg(long)]
    legacy_tracking: bool,

    /// Write a fleet snapshot to this file on every tick (used with --watch)
    #[arg(short, long, requires = "watch")]
    emit: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&args)?;
    let query = StoppageQuery {
        period: args.period,
        machine: args.machine.clone(),
        page: args.page,
        limit: args.limit.unwrap_or(settings.page_limit),
    };

    // Sources and outputs spawn tasks, so everything runs inside the runtime
    let rt = tokio::runtime::Runtime::new()?;
    let _guard = rt.enter();

    let source: Option<Box<dyn SampleSource>> = match (&args.file, &args.connect) {
        (Some(path), _) => Some(Box::new(FileSource::new(path))),
        (None, Some(addr)) => {
            let stream = rt.block_on(tokio::net::TcpStream::connect(addr.as_str()))?;
            Some(Box::new(StreamSource::spawn(stream, addr)))
        }
        (None, None) => None,
    };

    if source.is_none() && args.status_logs.is_none() {
        bail!("nothing to read: pass --file, --connect or --status-logs");
    }

    let outputs = args.emit.iter().map(Output::file).collect();
    let mut app = App::new(source, settings, outputs)?;
    if let Some(path) = &args.status_logs {
        app = app.with_status_logs(load_status_logs(path)?);
    }

    if args.watch {
        rt.block_on(watch(&mut app, &query, Duration::from_secs(args.refresh.max(1))))
    } else {
        let now = current_timestamp_ms();
        app.reload_data(now)?;
        app.tick(now);
        print_report(&app, &query, now);
        Ok(())
    }
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(idle) = &args.idle_after {
        parse_duration(idle)?;
        settings.idle_after = idle.clone();
    }
    if let Some(stopped) = &args.stopped_after {
        parse_duration(stopped)?;
        settings.stopped_after = stopped.clone();
    }
    if args.legacy_tracking {
        settings.legacy_tracking = true;
    }
    settings.validate()?;
    Ok(settings)
}

async fn watch(app: &mut App, query: &StoppageQuery, refresh: Duration) -> Result<()> {
    let emission = app.engine().start();
    let mut interval = tokio::time::interval(refresh);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = current_timestamp_ms();
                app.reload_data(now)?;
                app.tick(now);
                print_report(app, query, now);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    emission.stop();
    Ok(())
}

fn print_report(app: &App, query: &StoppageQuery, now_ms: u64) {
    println!("source: {}", app.source_description());
    if let Some(err) = &app.load_error {
        println!("warning: {}", err);
    }
    println!();

    let fleet = app.fleet(now_ms);
    print_fleet(&fleet, query.machine.as_deref());
    println!();
    print_stoppages(&app.stoppages(query, now_ms), query);
}

fn print_fleet(fleet: &FleetData, machine: Option<&str>) {
    let summary = fleet.summary();
    println!(
        "{} machines: {} running, {} idle, {} stopped | production {} | avg temp {:.1} pressure {:.1} rpm {:.0}",
        summary.total_machines,
        summary.running,
        summary.idle,
        summary.stopped,
        summary.total_production,
        summary.avg_temperature,
        summary.avg_pressure,
        summary.avg_rpm,
    );

    println!("{:<4} {:<28} {:<8} {:<20} {:>10}", "", "MACHINE", "STATUS", "LAST SEEN", "AGE");
    for m in fleet
        .machines
        .iter()
        .filter(|m| machine.map_or(true, |filter| m.key.matches(filter)))
    {
        let last_seen = m.last_seen_ms.map_or_else(|| "no data".to_string(), format_instant);
        let age = m
            .age
            .map_or_else(|| "-".to_string(), |a| format_duration(a.as_secs() as i64));
        println!(
            "{:<4} {:<28} {:<8} {:<20} {:>10}",
            m.status.symbol(),
            m.key.as_string(),
            m.status.label(),
            last_seen,
            age,
        );
    }
}

fn print_stoppages(report: &StoppageReport, query: &StoppageQuery) {
    println!(
        "Stoppages ({}): {} total, {} ongoing, downtime {}, mean {}",
        query.period.label(),
        report.summary.total_count,
        report.summary.ongoing_count,
        report.summary.total_downtime_display(),
        report.summary.mean_duration_display(),
    );

    println!("{:<28} {:<20} {:<20} {:>10}", "MACHINE", "START", "END", "DURATION");
    for row in &report.rows {
        let end = match row.end_ms {
            Some(end) => format_instant(end),
            None => "ongoing".to_string(),
        };
        let skew = if row.clock_skew { " (clock skew)" } else { "" };
        println!(
            "{:<28} {:<20} {:<20} {:>10}{}",
            row.machine_key.as_string(),
            format_instant(row.start_ms),
            end,
            row.duration_display(),
            skew,
        );
    }

    let more = if report.has_next_page { ", more available" } else { "" };
    println!("page {}{}", report.page, more);

    if !report.machines_without_data.is_empty() {
        let names: Vec<String> = report
            .machines_without_data
            .iter()
            .map(|k| k.to_string())
            .collect();
        println!("no stoppage data: {}", names.join(", "));
    }
}

fn format_instant(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
