use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::CommandArbiter;
use crate::models::command::Command;

use super::services::VehicleLink;

/// Reconnect backoff: half a second doubling to a five second cap, reset
/// after a successful connect.
const RECONNECT_INITIAL: Duration = Duration::from_millis(500);
const RECONNECT_CAP: Duration = Duration::from_secs(5);

/// Delivery counters shared between the streamer and the status endpoint.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    sent: AtomicU64,
    failed: AtomicU64,
    connected: AtomicBool,
}

impl DeliveryStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub(crate) fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

struct ReconnectState {
    backoff: Duration,
    next_attempt_at: tokio::time::Instant,
}

impl ReconnectState {
    fn new() -> Self {
        Self {
            backoff: RECONNECT_INITIAL,
            next_attempt_at: tokio::time::Instant::now(),
        }
    }

    fn due(&self) -> bool {
        tokio::time::Instant::now() >= self.next_attempt_at
    }

    fn on_success(&mut self) {
        self.backoff = RECONNECT_INITIAL;
        self.next_attempt_at = tokio::time::Instant::now();
    }

    fn on_failure(&mut self) {
        self.next_attempt_at = tokio::time::Instant::now() + self.backoff;
        self.backoff = (self.backoff * 2).min(RECONNECT_CAP);
    }
}

/// Push the arbiter's current command to the vehicle at a fixed cadence.
///
/// The loop never stops on link trouble: a tick that cannot deliver is
/// counted as a failure, the session is reopened with backoff, and every
/// fresh session starts from the arbiter's current value rather than
/// anything produced while the link was down. On cancellation the vehicle
/// gets a final stop before the transport closes.
#[tracing::instrument(skip_all)]
pub async fn task_stream_commands(
    token: CancellationToken,
    mut link: Box<dyn VehicleLink>,
    arbiter: Arc<CommandArbiter>,
    stats: Arc<DeliveryStats>,
    cadence: Duration,
) {
    info!("Started. Cadence {:?}, link {}.", cadence, link.describe());

    // interval() rejects a zero period.
    let cadence = cadence.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval(cadence);
    // A stalled write must not cause a burst of catch-up sends afterwards;
    // the vehicle only ever wants the current value.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reconnect = ReconnectState::new();
    let mut last_sent: Option<Command> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = ticker.tick() => {
                match deliver_tick(&mut link, &arbiter, &stats, &mut reconnect).await {
                    None => {}
                    Some(command) => {
                        if last_sent != Some(command) {
                            debug!("Now sending '{}'.", command.wire_char());
                            last_sent = Some(command);
                        }
                    }
                }
            }
        };
    }

    link.disconnect().await;
    stats.set_connected(false);
    info!(
        "Streamer exited after {} sends and {} failures.",
        stats.sent(),
        stats.failed()
    );
}

/// One cadence tick: make sure the link is up, then push the current
/// command. Returns the command written, if one was.
async fn deliver_tick(
    link: &mut Box<dyn VehicleLink>,
    arbiter: &CommandArbiter,
    stats: &DeliveryStats,
    reconnect: &mut ReconnectState,
) -> Option<Command> {
    if !link.is_connected() {
        if reconnect.due() {
            match link.connect().await {
                Ok(()) => {
                    info!("Link up: {}.", link.describe());
                    reconnect.on_success();
                    stats.set_connected(true);
                }
                Err(e) => {
                    warn!(
                        "Connect failed; retrying in {:?}. Error: {}",
                        reconnect.backoff, e
                    );
                    reconnect.on_failure();
                }
            }
        }
        if !link.is_connected() {
            stats.record_failure();
            return None;
        }
    }

    let command = arbiter.read();
    match link.write_command(command) {
        Ok(()) => {
            stats.record_sent();
            Some(command)
        }
        Err(e) => {
            warn!("Failed to deliver '{}'. Error: {}", command.wire_char(), e);
            stats.record_failure();
            stats.set_connected(false);
            None
        }
    }
}
