//! Discord Gateway (v10) connection feeding the relay.
//!
//! 1. GET `/gateway` for the WebSocket URL and connect.
//! 2. Wait for HELLO (op 10), send IDENTIFY (op 2), start heartbeats (op 1).
//! 3. Hand `MESSAGE_CREATE` and `INTERACTION_CREATE` dispatches to the relay,
//!    one spawned task per event.
//! 4. Reconnect with exponential backoff until shutdown is signalled.

use crate::discord::events::{parse_interaction_create, parse_message_create, parse_ready};
use crate::discord::rest::DiscordRest;
use crate::relay::Relay;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// GUILD_MESSAGES (1 << 9) | MESSAGE_CONTENT (1 << 15)
const GATEWAY_INTENTS: u64 = (1 << 9) | (1 << 15);

const BASE_RECONNECT_DELAY_SECS: u64 = 2;
const MAX_RECONNECT_DELAY_SECS: u64 = 120;
const MAX_RECONNECT_ATTEMPTS: u32 = 10;

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

/// Why a gateway session ended.
enum SessionEnd {
    Shutdown,
    Reconnect,
}

pub struct Gateway {
    rest: DiscordRest,
    relay: Arc<Relay>,
}

impl Gateway {
    pub fn new(rest: DiscordRest, relay: Arc<Relay>) -> Self {
        Self { rest, relay }
    }

    /// Run sessions until `shutdown_rx` flips to `true`.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            match self.run_session(&mut shutdown_rx, &mut attempt).await {
                SessionEnd::Shutdown => break,
                SessionEnd::Reconnect => {
                    let delay = backoff_delay(attempt);
                    attempt = (attempt + 1).min(MAX_RECONNECT_ATTEMPTS);
                    info!("Discord: reconnecting in {} seconds", delay.as_secs());
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("Discord gateway shut down");
    }

    async fn run_session(
        &self,
        shutdown_rx: &mut watch::Receiver<bool>,
        attempt: &mut u32,
    ) -> SessionEnd {
        let ws_url = tokio::select! {
            _ = shutdown_rx.changed() => return SessionEnd::Shutdown,
            result = self.rest.gateway_url() => match result {
                Ok(url) => url,
                Err(e) => {
                    warn!("Discord: failed to fetch gateway URL: {}", e);
                    return SessionEnd::Reconnect;
                }
            },
        };

        let ws_stream = tokio::select! {
            _ = shutdown_rx.changed() => return SessionEnd::Shutdown,
            result = connect_async(ws_url.as_str()) => match result {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!("Discord: WebSocket connect failed: {}", e);
                    return SessionEnd::Reconnect;
                }
            },
        };

        info!("Discord gateway WebSocket connected");
        *attempt = 0;

        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        // Wait for HELLO
        let heartbeat_interval = loop {
            let next = tokio::select! {
                _ = shutdown_rx.changed() => return SessionEnd::Shutdown,
                msg = ws_reader.next() => msg,
            };

            match next {
                Some(Ok(WsMessage::Text(raw))) => {
                    match serde_json::from_str::<GatewayPayload>(raw.as_str()) {
                        Ok(payload) if payload.op == 10 => {
                            break payload
                                .d
                                .as_ref()
                                .and_then(extract_heartbeat_interval)
                                .unwrap_or(41250);
                        }
                        Ok(_) => debug!("Discord: ignoring pre-HELLO payload"),
                        Err(e) => debug!("Discord: failed to parse pre-HELLO payload: {}", e),
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Discord: WebSocket error waiting for HELLO: {}", e);
                    return SessionEnd::Reconnect;
                }
                None => {
                    warn!("Discord: WebSocket closed before HELLO");
                    return SessionEnd::Reconnect;
                }
            }
        };
        debug!("Discord HELLO: heartbeat_interval = {}ms", heartbeat_interval);

        let identify = build_identify_payload(self.rest.token());
        if let Err(e) = ws_writer.send(WsMessage::Text(identify.into())).await {
            warn!("Discord: failed to send IDENTIFY: {}", e);
            return SessionEnd::Reconnect;
        }

        // Heartbeat ticks are forwarded to the writer through a channel so the
        // sequence number stays owned by this loop.
        let (tick_tx, mut tick_rx) = mpsc::channel::<()>(4);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                if tick_tx.send(()).await.is_err() {
                    return;
                }
            }
        });

        let mut sequence: Option<u64> = None;
        let end = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break SessionEnd::Shutdown,

                Some(()) = tick_rx.recv() => {
                    let hb = build_heartbeat_payload(sequence);
                    if let Err(e) = ws_writer.send(WsMessage::Text(hb.into())).await {
                        warn!("Discord: heartbeat send failed: {}", e);
                        break SessionEnd::Reconnect;
                    }
                }

                msg = ws_reader.next() => match msg {
                    Some(Ok(WsMessage::Text(raw))) => {
                        let payload = match serde_json::from_str::<GatewayPayload>(raw.as_str()) {
                            Ok(payload) => payload,
                            Err(e) => {
                                debug!("Discord: failed to parse gateway payload: {}", e);
                                continue;
                            }
                        };
                        if payload.s.is_some() {
                            sequence = payload.s;
                        }

                        match payload.op {
                            0 => {
                                if let (Some(event), Some(data)) = (payload.t.as_deref(), payload.d) {
                                    self.dispatch(event, data);
                                }
                            }
                            1 => {
                                let hb = build_heartbeat_payload(sequence);
                                if let Err(e) = ws_writer.send(WsMessage::Text(hb.into())).await {
                                    warn!("Discord: heartbeat response send failed: {}", e);
                                    break SessionEnd::Reconnect;
                                }
                            }
                            7 => {
                                info!("Discord: server requested reconnect");
                                break SessionEnd::Reconnect;
                            }
                            9 => {
                                warn!("Discord: invalid session, reconnecting");
                                break SessionEnd::Reconnect;
                            }
                            11 => debug!("Discord: heartbeat ACK received"),
                            op => debug!("Discord: unhandled opcode {}", op),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        if let Err(e) = ws_writer.send(WsMessage::Pong(data)).await {
                            warn!("Discord: pong send failed: {}", e);
                            break SessionEnd::Reconnect;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!("Discord: WebSocket closed by server: {:?}", frame);
                        break SessionEnd::Reconnect;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Discord: WebSocket stream error: {}", e);
                        break SessionEnd::Reconnect;
                    }
                    None => {
                        warn!("Discord: WebSocket stream ended");
                        break SessionEnd::Reconnect;
                    }
                },
            }
        };

        ticker.abort();
        end
    }

    /// Hand a dispatch event to the relay on its own task.
    fn dispatch(&self, event: &str, data: Value) {
        match event {
            "MESSAGE_CREATE" => {
                if let Some(message) = parse_message_create(&data) {
                    let relay = Arc::clone(&self.relay);
                    tokio::spawn(async move {
                        let outcome = relay.handle_message(&message).await;
                        debug!(
                            "Message in channel {} finished as {:?}",
                            message.channel_id, outcome
                        );
                    });
                }
            }
            "INTERACTION_CREATE" => {
                if let Some(invocation) = parse_interaction_create(&data) {
                    let relay = Arc::clone(&self.relay);
                    tokio::spawn(async move {
                        relay.handle_command(&invocation).await;
                    });
                }
            }
            "READY" => match parse_ready(&data) {
                Some(ready) => info!("Discord gateway READY as {}", ready.user.username),
                None => info!("Discord gateway READY"),
            },
            other => debug!("Discord: ignoring event {}", other),
        }
    }
}

fn build_identify_payload(token: &str) -> String {
    json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "dumtranslator",
                "device": "dumtranslator"
            }
        }
    })
    .to_string()
}

fn build_heartbeat_payload(sequence: Option<u64>) -> String {
    json!({ "op": 1, "d": sequence }).to_string()
}

fn extract_heartbeat_interval(data: &Value) -> Option<u64> {
    serde_json::from_value::<HelloData>(data.clone())
        .ok()
        .map(|hello| hello.heartbeat_interval)
}

fn backoff_delay(attempt: u32) -> Duration {
    let delay_secs = BASE_RECONNECT_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_RECONNECT_DELAY_SECS);
    Duration::from_secs(delay_secs)
}
