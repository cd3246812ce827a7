//! Process entry point wiring the SV publisher manager, GOOSE
//! subscriber, and trip-rule evaluator into one long-running daemon.

mod diagnostics;
mod signals;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use svts_common::config::{DaemonConfig, StreamConfig};
use svts_common::trip_flag::{TripGetter, TripSignal};
use svts_goose::datamap::GooseDataMap;
use svts_goose::rule::RuleSet;
use svts_goose::subscriber::GooseSubscriber;
use svts_runtime::manager::{PublisherManager, SinkBuilder};
use svts_runtime::pool::WorkerPool;
use svts_sink::{PacketSink, SimulatedSink};
use tracing::{error, info, warn};

use diagnostics::{format_prometheus_metrics, DiagnosticsCollector, DiagnosticsState};
use signals::SignalHandler;

/// Virtual SVTS daemon: publishes IEC 61850-9-2LE sampled values and
/// subscribes to GOOSE trip indications on one network interface.
#[derive(Parser, Debug)]
#[command(name = "svts-daemon", version, about)]
struct Args {
    /// Path to a TOML daemon configuration file. Falls back to built-in
    /// defaults if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network interface to bind for SV transmission and GOOSE receipt.
    #[arg(short, long, default_value = "eth0")]
    iface: String,

    /// Use the in-process simulated sink instead of a real interface.
    /// Implied automatically on non-Linux targets.
    #[arg(long)]
    simulated: bool,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);

    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    info!(
        iface = %args.iface,
        simulated = args.simulated,
        "starting svts-daemon"
    );

    if let Err(e) = run_daemon(&args, config) {
        error!(error = %e, "svts-daemon exited with error");
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> DaemonConfig {
    match &args.config {
        Some(path) => match DaemonConfig::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("failed to load config {}: {e}; using defaults", path.display());
                DaemonConfig::default()
            }
        },
        None => DaemonConfig::default(),
    }
}

fn run_daemon(args: &Args, config: DaemonConfig) -> svts_common::SvtsResult<()> {
    let signal_handler = SignalHandler::new().map_err(|e| {
        svts_common::SvtsError::Internal(format!("failed to install signal handlers: {e}"))
    })?;

    let diagnostics_state = Arc::new(DiagnosticsState::new());
    let diagnostics = DiagnosticsCollector::new(Arc::clone(&diagnostics_state));

    let pool = Arc::new(WorkerPool::new(config.worker_pool.clone())?);

    let use_simulated = args.simulated || cfg!(not(target_os = "linux"));
    let iface = args.iface.clone();
    let sv_sink_builder: SinkBuilder = build_sink_builder(iface.clone(), use_simulated);

    let manager = Arc::new(PublisherManager::new(
        Arc::clone(&pool),
        sv_sink_builder,
        config.stop_timeout,
    ));

    manager.create_stream(StreamConfig::default())?;
    manager.start(StreamConfig::default().stream_id.as_str())?;

    let data_map = Arc::new(GooseDataMap::new());
    let rules = Arc::new(Mutex::new(RuleSet::new()));
    let trip_signal = TripSignal::new(64);
    let trip_getter: Arc<dyn TripGetter> = Arc::new(trip_signal.clone());

    let goose_sink_factory = {
        let iface = iface.clone();
        Box::new(move || open_sink(&iface, use_simulated)) as svts_goose::subscriber::SinkFactory
    };
    let subscriber = GooseSubscriber::new(
        "goose-sub-0",
        goose_sink_factory,
        Arc::clone(&data_map),
        Arc::clone(&rules),
        trip_signal.clone(),
        config.goose_recv_timeout,
        config.stop_timeout,
    );
    subscriber.start()?;

    diagnostics.mark_started();
    info!("svts-daemon ready");

    const STATUS_INTERVAL: Duration = Duration::from_secs(10);
    let mut last_status = std::time::Instant::now();

    while !signal_handler.shutdown_requested() {
        if signal_handler.take_reload_request() {
            info!("reload requested; trip-rule set and scenario reload is not yet wired to a live config source");
        }

        poll_diagnostics(&manager, &subscriber, &trip_getter, &diagnostics_state);

        if last_status.elapsed() >= STATUS_INTERVAL {
            let snapshot = diagnostics.snapshot();
            info!(
                health = %snapshot.health,
                sv_ticks = snapshot.sv_ticks,
                sv_missed_ticks = snapshot.sv_missed_ticks,
                goose_pdus_decoded = snapshot.goose_pdus_decoded,
                trips_raised = snapshot.trips_raised,
                "{}",
                format_prometheus_metrics(&snapshot).lines().next().unwrap_or_default()
            );
            last_status = std::time::Instant::now();
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    info!("shutdown signal observed; draining");
    diagnostics_state.set_shutting_down();

    manager.stop_all();
    if let Err(e) = subscriber.stop() {
        warn!(error = %e, "GOOSE subscriber did not stop cleanly");
    }

    let final_snapshot = diagnostics.snapshot();
    info!(
        sv_ticks = final_snapshot.sv_ticks,
        sv_missed_ticks = final_snapshot.sv_missed_ticks,
        goose_pdus_decoded = final_snapshot.goose_pdus_decoded,
        trips_raised = final_snapshot.trips_raised,
        uptime_secs = final_snapshot.uptime_secs,
        "svts-daemon stopped"
    );
    Ok(())
}

fn poll_diagnostics(
    manager: &PublisherManager,
    subscriber: &GooseSubscriber,
    trip: &Arc<dyn TripGetter>,
    state: &DiagnosticsState,
) {
    let mut ticks = 0u64;
    let mut missed = 0u64;
    for stream_id in manager.list() {
        if let Some(publisher) = manager.get(&stream_id) {
            ticks += publisher.runtime().tick_seq();
            missed += publisher.runtime().missed_ticks();
        }
    }
    state.record_sv_totals(ticks, missed);
    state.record_goose_totals(
        subscriber.runtime().pdus_decoded(),
        subscriber.runtime().parse_errors(),
    );
    if trip.is_set() {
        state.record_trip();
        trip.clear();
    }
}

fn build_sink_builder(iface: String, use_simulated: bool) -> SinkBuilder {
    Arc::new(move |_cfg: &StreamConfig| open_sink(&iface, use_simulated))
}

fn open_sink(iface: &str, use_simulated: bool) -> svts_common::SvtsResult<Box<dyn PacketSink>> {
    if use_simulated {
        return Ok(Box::new(SimulatedSink::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])));
    }
    #[cfg(target_os = "linux")]
    {
        svts_sink::LinuxDatalinkSink::open(iface).map(|s| Box::new(s) as Box<dyn PacketSink>)
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = iface;
        unreachable!("use_simulated is forced true on non-Linux targets")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["svts-daemon"]);
        assert_eq!(args.iface, "eth0");
        assert!(!args.simulated);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_parse_overrides() {
        let args = Args::parse_from(["svts-daemon", "--iface", "eth1", "--simulated", "--log-level", "debug"]);
        assert_eq!(args.iface, "eth1");
        assert!(args.simulated);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        let args = Args::parse_from(["svts-daemon"]);
        let cfg = load_config(&args);
        assert_eq!(cfg.log_level, "info");
    }
}
