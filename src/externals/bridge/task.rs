use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::arbiter::CommandArbiter;
use crate::models::command::Command;
use crate::sources;

const BRIDGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// A remote that is down would otherwise flood the log at poll cadence;
/// only every this-many-th consecutive failure is reported.
const ERROR_LOG_EVERY: u32 = 10;

/// Mirror a remote controller's current command into the local arbiter.
///
/// Lets this process drive the vehicle while a cloud-hosted instance takes
/// the operator input. Only command changes are applied, so a local source
/// can still override until the remote says something new.
#[tracing::instrument(skip_all)]
pub async fn task_poll_bridge(
    token: CancellationToken,
    arbiter: Arc<CommandArbiter>,
    remote_url: String,
    poll_interval: Duration,
) {
    info!("Started. Remote: {}.", remote_url);

    let client = match Client::builder().timeout(BRIDGE_REQUEST_TIMEOUT).build() {
        Err(e) => {
            error!("Failed to build the bridge HTTP client. Error: {}", e);
            return;
        }
        Ok(client) => client,
    };
    let status_url = format!("{}/status", remote_url.trim_end_matches('/'));

    // interval() rejects a zero period.
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut consecutive_errors: u32 = 0;
    let mut last_seen: Option<Command> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = ticker.tick() => {
                match fetch_remote_command(&client, &status_url).await {
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors % ERROR_LOG_EVERY == 1 {
                            warn!(
                                "Bridge poll failed ({} in a row). Error: {}",
                                consecutive_errors, e
                            );
                        }
                    }
                    Ok(command) => {
                        consecutive_errors = 0;
                        if last_seen != Some(command) {
                            info!("Remote command: {}", command);
                            last_seen = Some(command);
                            arbiter.apply(sources::update_from_remote(command));
                        }
                    }
                }
            }
        };
    }
}

async fn fetch_remote_command(client: &Client, status_url: &str) -> anyhow::Result<Command> {
    let response = client.get(status_url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Remote returned {}.", response.status());
    }
    let payload: serde_json::Value = response.json().await?;
    remote_command_from_status(&payload)
}

/// Pull `current_command` out of a remote status payload.
fn remote_command_from_status(payload: &serde_json::Value) -> anyhow::Result<Command> {
    let symbol = match payload["current_command"].as_str() {
        None => anyhow::bail!("Status payload has no current_command."),
        Some(symbol) => symbol,
    };
    let mut chars = symbol.chars();
    let symbol_char = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => anyhow::bail!("current_command '{}' is not a single symbol.", symbol),
    };
    Ok(Command::try_from(symbol_char.to_ascii_uppercase())?)
}
