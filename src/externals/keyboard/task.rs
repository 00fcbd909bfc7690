use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::arbiter::CommandArbiter;
use crate::sources;

/// Read drive keys from stdin, one per line.
///
/// Headless stand-in for an operator console: w/a/s/d drive, x or a lone
/// space stops, q shuts the whole system down.
#[tracing::instrument(skip_all)]
pub async fn task_read_keyboard(token: CancellationToken, arbiter: Arc<CommandArbiter>) {
    info!("Started. Keys: w/a/s/d drive, x or space stops, q quits.");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("Failed to read stdin. Error: {}", e);
                        break;
                    }
                    Ok(None) => {
                        debug!("Stdin closed.");
                        break;
                    }
                    Ok(Some(line)) => handle_keyboard_line(&line, &arbiter, &token),
                }
            }
        };
    }
}

fn handle_keyboard_line(line: &str, arbiter: &CommandArbiter, token: &CancellationToken) {
    let key = match line.trim().chars().next() {
        // A line of only whitespace was a space bar press: emergency stop.
        None if line.contains(' ') => ' ',
        None => return,
        Some('q') | Some('Q') => {
            info!("Quit requested from the keyboard.");
            token.cancel();
            return;
        }
        Some(key) => key,
    };

    match sources::update_from_key(key) {
        Ok(update) => {
            debug!("Keyboard command: {}", update);
            arbiter.apply(update);
        }
        Err(e) => debug!("Ignoring key press. Reason: {}", e),
    }
}
