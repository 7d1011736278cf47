//! Realtime change subscriptions over the hosted service's Phoenix socket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

use super::{ChangeEvent, ChangeFeed, ChangeKind};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const FEED_CAPACITY: usize = 256;

/// `https://x.supabase.co` → `wss://x.supabase.co/realtime/v1/websocket?...`
pub fn websocket_url(base_url: &str, anon_key: &str, events_per_second: u32) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Realtime(format!("invalid base url: {e}")))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(AppError::Realtime(format!("unsupported scheme: {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| AppError::Realtime("cannot switch to websocket scheme".into()))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("eventsPerSecond", &events_per_second.to_string())
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

pub fn topic(table: &str) -> String {
    format!("realtime:public:{table}")
}

pub fn join_message(table: &str, event: ChangeKind, access_token: &str) -> Value {
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "postgres_changes": [
                    { "event": event.as_str(), "schema": "public", "table": table }
                ]
            },
            "access_token": access_token
        },
        "ref": "1"
    })
}

fn heartbeat_message(reference: u64) -> Value {
    json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": reference.to_string() })
}

/// Decode a `postgres_changes` frame.
pub fn parse_change(frame: &Value) -> Option<ChangeEvent> {
    if frame.get("event").and_then(Value::as_str) != Some("postgres_changes") {
        return None;
    }
    let data = frame.get("payload")?.get("data")?;
    let kind = match data.get("type").and_then(Value::as_str)? {
        "INSERT" => ChangeKind::Insert,
        "UPDATE" => ChangeKind::Update,
        "DELETE" => ChangeKind::Delete,
        _ => return None,
    };
    let non_empty = |key: &str| {
        data.get(key)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .cloned()
    };

    Some(ChangeEvent {
        table: data.get("table").and_then(Value::as_str).unwrap_or_default().to_string(),
        kind,
        record: non_empty("record"),
        old_record: non_empty("old_record"),
    })
}

fn is_join_error(frame: &Value) -> Option<String> {
    if frame.get("event").and_then(Value::as_str) != Some("phx_reply") {
        return None;
    }
    let payload = frame.get("payload")?;
    if payload.get("status").and_then(Value::as_str) == Some("error") {
        return Some(payload.get("response").map(Value::to_string).unwrap_or_default());
    }
    None
}

pub async fn subscribe(
    endpoint: Url,
    table: &str,
    event: ChangeKind,
    access_token: &str,
) -> Result<ChangeFeed> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(endpoint.as_str())
        .await
        .map_err(|e| AppError::Realtime(format!("WebSocket connect failed: {e}")))?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let join = join_message(table, event, access_token);
    ws_tx
        .send(Message::Text(join.to_string().into()))
        .await
        .map_err(|e| AppError::Realtime(format!("join failed: {e}")))?;
    info!(table, event = event.as_str(), "Realtime channel joined");

    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    let table_name = table.to_string();

    let task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut reference: u64 = 1;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    reference += 1;
                    let beat = heartbeat_message(reference);
                    if ws_tx.send(Message::Text(beat.to_string().into())).await.is_err() {
                        warn!(table = %table_name, "Realtime heartbeat failed");
                        break;
                    }
                }
                msg = ws_rx.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            warn!("Realtime read error: {}", e);
                            break;
                        }
                        None => break,
                    };
                    match msg {
                        Message::Text(text) => {
                            let frame: Value = match serde_json::from_str(&text) {
                                Ok(v) => v,
                                Err(e) => {
                                    warn!("Failed to parse realtime frame: {}", e);
                                    continue;
                                }
                            };
                            if let Some(reason) = is_join_error(&frame) {
                                warn!(table = %table_name, %reason, "Realtime join rejected");
                                break;
                            }
                            if let Some(change) = parse_change(&frame) {
                                if !event.matches(change.kind) {
                                    continue;
                                }
                                if tx.send(change).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Message::Ping(data) => {
                            let _ = ws_tx.send(Message::Pong(data)).await;
                        }
                        Message::Close(_) => {
                            debug!("Realtime socket closed by server");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }

        let _ = ws_tx.close().await;
        info!(table = %table_name, "Realtime channel left");
    });

    Ok(ChangeFeed::new(rx, task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_url() {
        let url = websocket_url("https://demo.supabase.co", "anon", 10).unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/realtime/v1/websocket");
        assert!(url.query().unwrap().contains("apikey=anon"));

        let url = websocket_url("http://localhost:54321", "anon", 10).unwrap();
        assert_eq!(url.scheme(), "ws");
    }

    #[test]
    fn test_join_message_targets_public_table() {
        let msg = join_message("people", ChangeKind::All, "tok");
        assert_eq!(msg["topic"], "realtime:public:people");
        assert_eq!(msg["payload"]["config"]["postgres_changes"][0]["event"], "*");
        assert_eq!(msg["payload"]["access_token"], "tok");
    }

    #[test]
    fn test_parse_change_frame() {
        let frame = json!({
            "topic": "realtime:public:people",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "DELETE",
                    "table": "people",
                    "record": {},
                    "old_record": { "id": "1" }
                }
            }
        });
        let change = parse_change(&frame).unwrap();
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.table, "people");
        assert!(change.record.is_none());
        assert_eq!(change.old_record.unwrap()["id"], "1");

        assert!(parse_change(&json!({ "event": "phx_reply", "payload": {} })).is_none());
    }

    #[test]
    fn test_join_error_detection() {
        let frame = json!({
            "event": "phx_reply",
            "payload": { "status": "error", "response": { "reason": "unauthorized" } }
        });
        assert!(is_join_error(&frame).unwrap().contains("unauthorized"));
    }
}
