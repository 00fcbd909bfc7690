use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::arbiter::CommandArbiter;
use crate::externals::vehicle::task::DeliveryStats;
use crate::models::hand::HandSnapshot;
use crate::sources;

/// Request bodies beyond this are cut off; a landmark snapshot is a couple
/// of kilobytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// How many history entries /status reports.
const STATUS_HISTORY_LEN: usize = 10;

/// Serve the HTTP control surface: manual commands, phrase resolution,
/// landmark ingestion, and status. Hand-rolled connection-per-request
/// HTTP/1.1; every response is JSON and closes the connection.
#[tracing::instrument(skip_all)]
pub async fn task_serve_control_api(
    token: CancellationToken,
    listener: TcpListener,
    arbiter: Arc<CommandArbiter>,
    stats: Arc<DeliveryStats>,
    tx_snapshots: Sender<HandSnapshot>,
) {
    info!("Started.");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            accepted = listener.accept() => {
                match accepted {
                    Err(e) => warn!("Failed to accept a connection. Error: {}", e),
                    Ok((stream, peer)) => {
                        trace!("Accepted connection from {}.", peer);
                        let arbiter = arbiter.clone();
                        let stats = stats.clone();
                        let tx_snapshots = tx_snapshots.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, arbiter, stats, tx_snapshots).await
                            {
                                debug!("Connection error: {}", e);
                            }
                        });
                    }
                }
            }
        };
    }
}

async fn handle_connection(
    stream: TcpStream,
    arbiter: Arc<CommandArbiter>,
    stats: Arc<DeliveryStats>,
    tx_snapshots: Sender<HandSnapshot>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let (method, path) = match parse_request_line(request_line.trim()) {
        None => {
            let payload = json!({"success": false, "message": "malformed request line"});
            return write_response(&mut writer, 400, &payload).await;
        }
        Some(parts) => parts,
    };

    let mut content_length = 0usize;
    loop {
        let mut header = String::new();
        let read = reader.read_line(&mut header).await?;
        if read == 0 || header.trim().is_empty() {
            break;
        }
        if let Some(value) = header_value(&header, "content-length") {
            content_length = value.parse().unwrap_or(0);
        }
    }

    let mut body = vec![0u8; content_length.min(MAX_BODY_BYTES)];
    if !body.is_empty() {
        reader.read_exact(&mut body).await?;
    }

    let (status, payload) = route_request(&method, &path, &body, &arbiter, &stats, &tx_snapshots);
    write_response(&mut writer, status, &payload).await
}

fn parse_request_line(line: &str) -> Option<(String, String)> {
    let mut parts = line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    // Query strings are allowed but carry nothing we use.
    let path = path.split('?').next().unwrap_or(path);
    Some((method.to_string(), path.to_string()))
}

fn header_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let (key, value) = header.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim())
    } else {
        None
    }
}

fn route_request(
    method: &str,
    path: &str,
    body: &[u8],
    arbiter: &CommandArbiter,
    stats: &DeliveryStats,
    tx_snapshots: &Sender<HandSnapshot>,
) -> (u16, serde_json::Value) {
    match (method, path) {
        ("GET", "/") => (
            200,
            json!({
                "service": "smartcar control api",
                "endpoints": {
                    "GET /cmd/{W|A|S|D|X}": "apply a manual command",
                    "GET /status": "current command and delivery counters",
                    "POST /parse": "resolve a phrase: {\"text\": \"...\"}",
                    "POST /hands": "submit a landmark snapshot",
                },
            }),
        ),
        ("GET", "/status") => (200, status_payload(arbiter, stats)),
        ("GET", _) if path.starts_with("/cmd/") => {
            let segment = &path["/cmd/".len()..];
            match sources::update_from_http_path(segment) {
                Err(e) => {
                    debug!("Rejected command request '{}'. Reason: {}", segment, e);
                    (400, json!({"success": false, "message": e.to_string()}))
                }
                Ok(update) => {
                    info!("Manual command: {}", update);
                    let symbol = update.command.wire_char().to_string();
                    arbiter.apply(update);
                    (200, json!({"success": true, "command": symbol}))
                }
            }
        }
        ("POST", "/parse") => route_parse(body, arbiter),
        ("POST", "/hands") => route_hands(body, tx_snapshots),
        _ => (
            404,
            json!({"success": false, "message": format!("no route for {} {}", method, path)}),
        ),
    }
}

fn route_parse(body: &[u8], arbiter: &CommandArbiter) -> (u16, serde_json::Value) {
    let payload: serde_json::Value = match serde_json::from_slice(body) {
        Err(e) => {
            return (
                400,
                json!({"success": false, "message": format!("malformed body: {}", e)}),
            )
        }
        Ok(payload) => payload,
    };
    let text = match payload["text"].as_str() {
        None => {
            return (
                400,
                json!({"success": false, "message": "missing 'text' field"}),
            )
        }
        Some(text) => text,
    };

    match sources::update_from_phrase(text) {
        None => {
            debug!("No keyword matched in '{}'.", text);
            (
                200,
                json!({"success": false, "message": "no keyword matched"}),
            )
        }
        Some((update, keyword)) => {
            info!("Voice command: {} (matched '{}').", update, keyword);
            let symbol = update.command.wire_char().to_string();
            arbiter.apply(update);
            (
                200,
                json!({"success": true, "command": symbol, "matched_text": keyword}),
            )
        }
    }
}

fn route_hands(body: &[u8], tx_snapshots: &Sender<HandSnapshot>) -> (u16, serde_json::Value) {
    let snapshot: HandSnapshot = match serde_json::from_slice(body) {
        Err(e) => {
            return (
                400,
                json!({"success": false, "message": format!("malformed snapshot: {}", e)}),
            )
        }
        Ok(snapshot) => snapshot,
    };
    let hands = snapshot.hands.len();
    if let Err(e) = tx_snapshots.send(snapshot) {
        // No classifier listening; the snapshot is simply dropped.
        debug!("No snapshot receiver. Error: {}", e);
    }
    (200, json!({"success": true, "hands": hands}))
}

fn status_payload(arbiter: &CommandArbiter, stats: &DeliveryStats) -> serde_json::Value {
    let status = arbiter.status();
    let history: Vec<serde_json::Value> = arbiter
        .history(STATUS_HISTORY_LEN)
        .iter()
        .map(|update| {
            json!({
                "command": update.command.wire_char().to_string(),
                "source": update.source.to_string(),
                "age_ms": update.at.elapsed().as_millis() as u64,
            })
        })
        .collect();

    json!({
        "current_command": status.current.wire_char().to_string(),
        "command_count": stats.sent(),
        "is_running": true,
        "is_connected": stats.is_connected(),
        "failed_write_count": stats.failed(),
        "total_updates": status.total_updates,
        "last_source": status.last_source.map(|source| source.to_string()),
        "history": history,
    })
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    status: u16,
    payload: &serde_json::Value,
) -> anyhow::Result<()> {
    let body = payload.to_string();
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}
