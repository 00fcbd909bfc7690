pub mod arbiter;
pub mod cli;
pub mod controls;
pub mod externals;
pub mod models;
pub mod sources;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, signal, sync::broadcast};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::arbiter::CommandArbiter;
use crate::cli::Cli;
use crate::externals::bridge::task::task_poll_bridge;
use crate::externals::gesture::task::task_classify_gestures;
use crate::externals::keyboard::task::task_read_keyboard;
use crate::externals::vehicle::services::{SerialVehicleLink, SimulatedVehicleLink, VehicleLink};
use crate::externals::vehicle::task::{task_stream_commands, DeliveryStats};
use crate::externals::web::task::task_serve_control_api;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(cli.log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    let tracker = TaskTracker::new();

    let token = CancellationToken::new();

    let arbiter = Arc::new(CommandArbiter::new(cli.history_capacity));
    let stats = Arc::new(DeliveryStats::default());

    // NOTE: Landmark snapshots fan in from the web listener to the classifier.
    let (tx_hand_snapshots, rx_hand_snapshots) = broadcast::channel(32);

    let link: Box<dyn VehicleLink> = if cli.no_hardware {
        tracing::info!("Running without hardware; commands go to a simulated link.");
        Box::new(SimulatedVehicleLink::new())
    } else {
        Box::new(SerialVehicleLink::new(cli.link_config()))
    };

    let token_clone = token.clone();
    let arbiter_clone = arbiter.clone();
    let stats_clone = stats.clone();
    let cadence = cli.cadence();
    tracker.spawn(async move {
        task_stream_commands(token_clone, link, arbiter_clone, stats_clone, cadence).await
    });

    let token_clone = token.clone();
    let arbiter_clone = arbiter.clone();
    let thresholds = cli.thresholds();
    tracker.spawn(async move {
        task_classify_gestures(token_clone, rx_hand_snapshots, arbiter_clone, thresholds).await
    });

    let listener = TcpListener::bind(cli.http_addr).await?;
    tracing::info!("Control API listening on {}.", listener.local_addr()?);
    let token_clone = token.clone();
    let arbiter_clone = arbiter.clone();
    let stats_clone = stats.clone();
    let tx_hand_snapshots_clone = tx_hand_snapshots.clone();
    tracker.spawn(async move {
        task_serve_control_api(
            token_clone,
            listener,
            arbiter_clone,
            stats_clone,
            tx_hand_snapshots_clone,
        )
        .await
    });

    if !cli.no_keyboard {
        let token_clone = token.clone();
        let arbiter_clone = arbiter.clone();
        tracker.spawn(async move { task_read_keyboard(token_clone, arbiter_clone).await });
    }

    if let Some(bridge_url) = cli.bridge_url.clone() {
        let token_clone = token.clone();
        let arbiter_clone = arbiter.clone();
        let poll_interval = cli.bridge_poll();
        tracker.spawn(async move {
            task_poll_bridge(token_clone, arbiter_clone, bridge_url, poll_interval).await
        });
    }

    let token_clone = token.clone();
    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    token.cancel();
                },
                Err(e) => {
                    tracing::error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
    }

    tracker.close();
    tracker.wait().await;

    Ok(())
}
