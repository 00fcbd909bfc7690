use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::CommandArbiter;
use crate::controls::{classify, GestureThresholds};
use crate::models::command::Command;
use crate::models::hand::HandSnapshot;
use crate::sources;

/// Turn landmark snapshots into command updates.
///
/// Every frame produces an update, even a repeated one; only changes make
/// it into the log. Falling behind the camera is handled by skipping stale
/// frames, the newest one is always the one that matters.
#[tracing::instrument(skip_all)]
pub async fn task_classify_gestures(
    token: CancellationToken,
    mut rx_snapshots: Receiver<HandSnapshot>,
    arbiter: Arc<CommandArbiter>,
    thresholds: GestureThresholds,
) {
    info!("Started.");

    let mut last_command: Option<Command> = None;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            snapshot = rx_snapshots.recv() => {
                match snapshot {
                    Err(RecvError::Closed) => {
                        debug!("Snapshot channel closed.");
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Skipped {} stale snapshots.", skipped);
                    }
                    Ok(snapshot) => {
                        let result = classify(&snapshot, &thresholds);
                        if last_command != Some(result.command) {
                            info!("Gesture command: {}", result);
                            last_command = Some(result.command);
                        }
                        arbiter.apply(sources::update_from_gesture(&result));
                    }
                }
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::command_update::CommandSource;
    use crate::models::hand::{
        DetectedHand, Handedness, LandmarkPoint, FINGER_TIP_PIP_PAIRS, LANDMARK_COUNT,
    };
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// A fist: every landmark on one line, so no finger clears the margin.
    fn fist(label: Handedness) -> DetectedHand {
        DetectedHand {
            handedness: label,
            landmarks: [LandmarkPoint { x: 0.0, y: 300.0 }; LANDMARK_COUNT],
        }
    }

    /// An open hand: all four checked fingertips raised well past the margin.
    fn open_hand(label: Handedness) -> DetectedHand {
        let mut hand = fist(label);
        for (tip, _) in FINGER_TIP_PIP_PAIRS {
            hand.landmarks[tip].y = 200.0;
        }
        hand
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("Condition was not met in time.");
    }

    #[tokio::test]
    async fn test_snapshots_drive_the_arbiter() {
        let (tx, rx) = broadcast::channel(8);
        let token = CancellationToken::new();
        let arbiter = Arc::new(CommandArbiter::default());

        let handle = tokio::spawn(task_classify_gestures(
            token.clone(),
            rx,
            arbiter.clone(),
            GestureThresholds::default(),
        ));

        tx.send(HandSnapshot {
            hands: vec![fist(Handedness::Left), fist(Handedness::Right)],
        })
        .expect("Failed to send the snapshot.");

        let arbiter_clone = arbiter.clone();
        wait_until(move || arbiter_clone.read() == Command::Forward).await;
        assert_eq!(arbiter.status().last_source, Some(CommandSource::Gesture));

        tx.send(HandSnapshot {
            hands: vec![open_hand(Handedness::Left)],
        })
        .expect("Failed to send the snapshot.");

        let arbiter_clone = arbiter.clone();
        wait_until(move || arbiter_clone.read() == Command::Stop).await;

        token.cancel();
        handle.await.expect("Classifier task panicked.");
    }
}
