use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use arq_abstract::{ProtocolMode, SimConfig};
use arq_engine::endpoint_pair;
use arq_simulator::{SimulationReport, Simulator, run_scenario};

#[derive(Parser, Debug)]
#[command(author, version, about = "ARQ protocol simulator")]
struct Args {
    /// Protocol variant to run: abt, gbn or sr.
    #[arg(long, default_value = "gbn")]
    mode: ProtocolMode,

    /// Sender/receiver window size (Alternating-Bit always uses 1).
    #[arg(long, default_value_t = 4)]
    window: u32,

    /// Number of messages the application submits.
    #[arg(long, default_value_t = 8)]
    messages: u32,

    /// Simulated milliseconds between submissions.
    #[arg(long, default_value_t = 200)]
    spacing: u64,

    #[arg(long, default_value_t = 0.0)]
    loss_rate: f64,

    #[arg(long, default_value_t = 0.0)]
    corrupt_rate: f64,

    #[arg(long, default_value_t = 10)]
    min_latency: u64,

    #[arg(long, default_value_t = 100)]
    max_latency: u64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Simulated-time budget; the Selective-Repeat tick never goes quiet,
    /// so every run is bounded.
    #[arg(long, default_value_t = 600_000)]
    max_time: u64,

    /// Run a scripted scenario from disk instead of the default workload.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    info!("arq-sim starting ({} mode)", args.mode);

    let (sender, receiver) = endpoint_pair(args.mode);

    let report = if let Some(path) = &args.scenario {
        run_scenario(path, sender, receiver)
            .with_context(|| format!("scenario {} failed", path.display()))?
    } else {
        run_default_sim(&args, sender, receiver)
    };

    info!(
        "Done: {} message(s) delivered, {} sender packet(s), {}ms simulated",
        report.delivered_data.len(),
        report.sender_packet_count,
        report.duration_ms
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn run_default_sim(
    args: &Args,
    sender: Box<dyn arq_abstract::ProtocolEndpoint>,
    receiver: Box<dyn arq_abstract::ProtocolEndpoint>,
) -> SimulationReport {
    let config = SimConfig {
        loss_rate: args.loss_rate,
        corrupt_rate: args.corrupt_rate,
        min_latency: args.min_latency,
        max_latency: args.max_latency,
        seed: args.seed,
        window_size: args.window,
    };
    let mut sim = Simulator::new(config, sender, receiver);
    for i in 0..args.messages {
        let at = 100 + u64::from(i) * args.spacing;
        sim.schedule_app_send(at, format!("message-{i:03}").into_bytes());
    }
    sim.run_for(args.max_time);
    sim.export_report()
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("failed to serialize trace")?;
    fs::write(path, &data)
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(())
}
