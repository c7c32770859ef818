//! scaleguardd — standalone ScaleGuard daemon.
//!
//! Assembles a [`scaleguard_core::ScalerController`] against an
//! in-memory [`scaleguard_transport::MockTransport`], since the real
//! Resource Cluster / Host Provisioner / Rule Store each live outside
//! this repo's scope. Useful as a smoke-test harness and as a worked
//! example of wiring the controller up.
//!
//! # Usage
//!
//! ```text
//! scaleguardd run --cluster-id cluster-1 --sample-interval-secs 5 --refresh-interval-secs 60
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use scaleguard_core::{ControllerConfig, ScalerController, SystemClock};
use scaleguard_transport::{MachineDefinition, MockTransport, ScaleSpec, UsageByMachineDefinition};

#[derive(Parser)]
#[command(name = "scaleguardd", about = "ScaleGuard autoscaling daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller against a seeded in-memory transport until Ctrl-C.
    Run {
        /// Cluster this controller instance is responsible for.
        #[arg(long, default_value = "cluster-1")]
        cluster_id: String,

        /// How often to sample cluster usage, in seconds.
        #[arg(long, default_value = "5")]
        sample_interval_secs: u64,

        /// How often to refresh the rule set from the rule store, in seconds.
        #[arg(long, default_value = "60")]
        refresh_interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scaleguardd=debug,scaleguard_core=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            cluster_id,
            sample_interval_secs,
            refresh_interval_secs,
        } => run(cluster_id, sample_interval_secs, refresh_interval_secs).await,
    }
}

async fn run(cluster_id: String, sample_interval_secs: u64, refresh_interval_secs: u64) -> anyhow::Result<()> {
    info!(cluster_id = %cluster_id, "scaleguard daemon starting");

    let transport = MockTransport::new(&cluster_id);
    transport.set_rules(demo_rules(&cluster_id)).await;
    transport.set_usage(demo_usage()).await;
    let transport = Arc::new(transport);

    let config = ControllerConfig::new(
        &cluster_id,
        Duration::from_secs(sample_interval_secs),
        Duration::from_secs(refresh_interval_secs),
    );

    let handle = ScalerController::spawn(
        config,
        Arc::new(SystemClock),
        transport.clone(),
        transport.clone(),
        transport.clone(),
    )
    .await;

    info!("scaleguard daemon running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    handle.shutdown().await;
    info!("scaleguard daemon stopped");
    Ok(())
}

fn demo_rules(cluster_id: &str) -> BTreeMap<String, ScaleSpec> {
    BTreeMap::from([
        (
            "small".to_string(),
            ScaleSpec {
                cluster_id: cluster_id.to_string(),
                sku_id: "small".to_string(),
                min_size: 11,
                max_size: 15,
                min_idle_to_keep: 5,
                max_idle_to_keep: 10,
                cool_down_secs: 60,
            },
        ),
        (
            "large".to_string(),
            ScaleSpec {
                cluster_id: cluster_id.to_string(),
                sku_id: "large".to_string(),
                min_size: 1,
                max_size: 5,
                min_idle_to_keep: 1,
                max_idle_to_keep: 3,
                cool_down_secs: 120,
            },
        ),
    ])
}

fn demo_usage() -> Vec<UsageByMachineDefinition> {
    vec![
        UsageByMachineDefinition {
            sku_id: "small".to_string(),
            def: MachineDefinition {
                cpu_cores: 2,
                mem_mb: 4_096,
                network_mbps: 500,
                disk_mb: 51_200,
                num_ports: 2,
            },
            idle_count: 4,
            total_count: 10,
        },
        UsageByMachineDefinition {
            sku_id: "large".to_string(),
            def: MachineDefinition {
                cpu_cores: 16,
                mem_mb: 65_536,
                network_mbps: 10_000,
                disk_mb: 1_048_576,
                num_ports: 8,
            },
            idle_count: 2,
            total_count: 3,
        },
    ]
}
