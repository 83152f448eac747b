//! Offline launch planner
//!
//! Shows the order, content signatures, producer schedule and mesh links a
//! node would compute from a dump of the discovery table, without touching
//! any chain.

use bootmesh_consensus::{Role, Schedule};
use bootmesh_discovery::{rows_from_json, rows_from_yaml, Discovery};
use bootmesh_orchestrator::launch::{now_secs, seed_from_block_id, NetworkView};
use bootmesh_orchestrator::OrchestratorConfig;
use bootmesh_topology::mesh_addresses;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    eprintln!("Usage: bootmesh-plan <rows.json|rows.yaml> [launch-block-id]");
    eprintln!();
    eprintln!("The local discovery file is read from BOOTMESH_MY_DISCOVERY.");
    eprintln!("Without a block id the schedule is left unshuffled.");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bootmesh=info,bootmesh_plan=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || matches!(args[1].as_str(), "-h" | "--help" | "help") {
        print_usage();
        std::process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let config = OrchestratorConfig::from_env()?;
    let me = Discovery::from_yaml(&std::fs::read_to_string(&config.my_discovery)?)?;

    let dump = std::fs::read_to_string(&args[1])?;
    let rows = if args[1].ends_with(".json") {
        rows_from_json(&dump)?
    } else {
        rows_from_yaml(&dump)?
    };
    info!("Loaded {} discovery row(s) from {}", rows.len(), args[1]);

    let view = NetworkView::from_rows(
        rows,
        &me,
        now_secs(),
        config.active_window_secs,
        config.elect.as_ref(),
    )?;
    view.log_order();

    let schedule = match args.get(2) {
        Some(block_id) => {
            let seed = seed_from_block_id(block_id);
            info!("Shuffling with seed {} from block {}", seed, block_id);
            Schedule::from_seed(view.ordered, seed)
        }
        None => Schedule::unshuffled(view.ordered),
    };

    for (i, peer) in schedule.peers().iter().enumerate() {
        info!(
            "{:>3}. {:<13} {:<13} {}",
            i,
            peer.account(),
            peer.producer_name(),
            Role::at(i)
        );
    }

    let account = &me.seed_network_account_name;
    info!("{} is {}", account, schedule.role_of(account));
    for name in schedule.producer_names_of(account) {
        info!("  produces as {}", name);
    }
    for address in mesh_addresses(schedule.peers(), account) {
        info!("  links to {}", address);
    }

    Ok(())
}
