//! HVAC scheduler entry point: CLI wiring and config-driven engine construction.

mod cli;

use std::path::Path;
use std::process;

use hvac_sched::config::ScenarioConfig;
use hvac_sched::io::export::{export_segments_csv, export_ticks_csv};
use hvac_sched::room::RoomUnit;
use hvac_sched::sim::kpi::RunReport;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: failed to install tracing subscriber: {e}");
    }
}

fn load_scenario(opts: &cli::CliOptions) -> ScenarioConfig {
    let loaded = match (&opts.scenario, &opts.preset) {
        (Some(path), _) => ScenarioConfig::from_toml_file(path),
        (None, Some(name)) => ScenarioConfig::from_preset(name),
        (None, None) => ScenarioConfig::from_preset(cli::DEFAULT_PRESET),
    };
    match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    }
}

fn main() {
    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(2);
        }
    };
    init_tracing();

    let mut scenario = load_scenario(&opts);
    if let Some(seed) = opts.seed {
        scenario.engine.seed = seed;
    }
    if let Some(ticks) = opts.ticks {
        scenario.engine.ticks = ticks;
    }

    let mut engine = match scenario.build_engine() {
        Ok(engine) => engine,
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            process::exit(1);
        }
    };

    if opts.serve {
        serve(engine, opts.port);
        return;
    }

    let records = engine.run_script(&scenario.script(), scenario.engine.ticks);

    for r in &records {
        println!("{r}");
    }

    let report = RunReport::from_records(&records);
    println!("\n{report}");

    if let Some(ref path) = opts.telemetry_out {
        if let Err(e) = export_ticks_csv(&records, path) {
            eprintln!("error: failed to write tick CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {}", path.display());
    }

    if let Some(ref path) = opts.ledger_out {
        let bills: Vec<_> = engine.rooms().map(RoomUnit::bill).collect();
        if let Err(e) = export_segments_csv(&bills, Path::new(path)) {
            eprintln!("error: failed to write ledger CSV: {e}");
            process::exit(1);
        }
        eprintln!("Ledger written to {}", path.display());
    }
}

#[cfg(feature = "api")]
fn serve(engine: hvac_sched::sim::engine::Engine, port: u16) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use hvac_sched::api::{self, AppState};

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    let result = rt.block_on(async move {
        let (driver, _task) = hvac_sched::runtime::spawn(engine);
        api::serve(Arc::new(AppState { driver }), addr).await
    });
    if let Err(e) = result {
        eprintln!("error: API server failed: {e}");
        process::exit(1);
    }
}

#[cfg(not(feature = "api"))]
fn serve(_engine: hvac_sched::sim::engine::Engine, _port: u16) {
    eprintln!("error: --serve requires the `api` feature");
    process::exit(1);
}
