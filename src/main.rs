//! Charge point simulator entry point: CLI wiring and sink construction.

mod cli;

use std::future::Future;
use std::io;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use chargepoint_sim::config::{SimulatorConfig, SinkKind};
use chargepoint_sim::logging::init_tracing;
use chargepoint_sim::sim::Fleet;
use chargepoint_sim::sim::clock::LiveClock;
use chargepoint_sim::sink::{EventSink, MemorySink};
use chargepoint_sim::topology::Topology;

use crate::cli::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = match args.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    let errors = config.validate();
    if !errors.is_empty() {
        for err in &errors {
            eprintln!("{err}");
        }
        process::exit(1);
    }

    let topology = Topology::builtin();
    let sink = open_sink(&config, &topology)?;
    let seed = config.simulation.seed.unwrap_or_else(rand::random);
    info!(seed, "Using master seed");

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    let fleet = Fleet::new(
        config,
        topology.charge_points,
        sink,
        LiveClock::system(),
        seed,
    );
    if let Err(err) = fleet.run(shutdown).await {
        error!(%err, "Simulation aborted");
        return Err(err).context("simulation aborted");
    }
    Ok(())
}

/// Cancels `shutdown` once `signal` fires.
///
/// A signal handler that cannot be installed leaves the run going.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("Interrupted, shutting down");
            shutdown.cancel();
        }
        Err(err) => warn!(%err, "Cannot listen for Ctrl-C"),
    }
}

fn open_sink(config: &SimulatorConfig, topology: &Topology) -> anyhow::Result<Arc<dyn EventSink>> {
    match config.sink.kind {
        SinkKind::Memory => {
            info!("Writing events to memory");
            Ok(Arc::new(MemorySink::new()))
        }
        #[cfg(feature = "sqlite")]
        SinkKind::Sqlite => {
            let path = &config.sink.path;
            let sink = chargepoint_sim::sink::SqliteSink::open(path)
                .with_context(|| format!("cannot open database {}", path.display()))?;
            sink.seed_topology(topology)
                .context("cannot seed charge point topology")?;
            info!(path = %path.display(), "Writing events to SQLite");
            Ok(Arc::new(sink))
        }
        #[cfg(not(feature = "sqlite"))]
        SinkKind::Sqlite => {
            let _ = topology;
            anyhow::bail!("built without the `sqlite` feature; use --in-memory")
        }
    }
}
