use std::io::Write;
use std::time::Instant;

use clap::Parser;
use env_logger::Builder;
use log::info;

use edgesim::config::{OrchestratorScenario, SimulationConfig};
use edgesim::network::DelayKind;
use edgesim::placement::FitStrategy;
use edgesim::simulation::EdgeSimulation;
use edgesim::task::{FailureReason, Tier};

#[derive(Parser, Debug)]
#[command(about = "Runs edge offloading simulation")]
struct Args {
    /// Path to simulation config
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Overrides the random seed from config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Overrides VM selection policy (first-fit, next-fit, best-fit, worst-fit, random-fit)
    #[arg(short, long)]
    policy: Option<FitStrategy>,

    /// Overrides the number of mobile devices
    #[arg(short, long)]
    devices: Option<u32>,

    /// Balance load among all edge hosts
    #[arg(long)]
    load_balancing: bool,
}

fn main() {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    let mut config = match SimulationConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(policy) = args.policy {
        config.orchestrator.policy = policy;
    }
    if let Some(devices) = args.devices {
        config.mobile_devices = devices;
    }
    if args.load_balancing {
        config.orchestrator.scenario = OrchestratorScenario::TwoTierWithEo;
    }

    let mut sim = match EdgeSimulation::new(config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let workload = sim.generate_workload().unwrap();
    info!("Generated {} tasks", workload.tasks.len());
    sim.load_workload(&workload);

    let t = Instant::now();
    sim.step_until_no_events();
    let elapsed = t.elapsed().as_secs_f64();

    let stats = sim.stats();
    println!(
        "Processed {} events in {:.2}s ({:.0} events/s), simulation time {:.2}",
        sim.event_count(),
        elapsed,
        sim.event_count() as f64 / elapsed,
        sim.current_time()
    );
    println!(
        "Tasks: {} admitted, {} completed, {} failed ({:.2}%)",
        stats.admitted,
        stats.completed(),
        stats.failed(),
        stats.failure_rate()
    );
    for reason in [FailureReason::Bandwidth, FailureReason::Mobility, FailureReason::Capacity] {
        println!("  failed due to {:?}: {}", reason, stats.failed_with(reason));
    }
    for tier in [Tier::Edge, Tier::Cloud] {
        println!(
            "  {:?}: {} completed, {} failed",
            tier,
            stats.delivered_by_tier.get(&tier).copied().unwrap_or(0),
            stats.failures_by_tier.get(&tier).copied().unwrap_or(0)
        );
    }
    println!(
        "Mean service time: {:.3}, mean processing time: {:.3}",
        stats.service_time.mean(),
        stats.processing_time.mean()
    );
    for kind in [DelayKind::Wlan, DelayKind::Wan] {
        let upload = stats.upload_delay.get(&kind).map_or(0., |m| m.mean());
        let download = stats.download_delay.get(&kind).map_or(0., |m| m.mean());
        println!("Mean {:?} delay: upload {:.3}, download {:.3}", kind, upload, download);
    }
}
