//! WebSocket implementation of [`RealtimeBus`] with automatic reconnect.
//!
//! [`connect`] spawns a background task that owns the socket. Outbound events
//! go through a bounded command queue; inbound events and link changes come
//! back as [`BusSignal`]s on the returned receiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::bus::{BusError, BusSignal, RealtimeBus};
use crate::error::Result;
use crate::protocol::{ClientEvent, ServerEvent};

#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Server endpoint, e.g. `ws://localhost:3001/ws`.
    pub url: String,
    pub connect_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_delay_secs: u64,
    pub command_capacity: usize,
    pub signal_capacity: usize,
}

impl BusConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_secs: 10,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
            command_capacity: 256,
            signal_capacity: 256,
        }
    }
}

#[derive(Debug)]
enum Command {
    Emit(ClientEvent),
    Shutdown,
}

/// Handle to the background connection.
#[derive(Debug, Clone)]
pub struct WsBus {
    command_tx: mpsc::Sender<Command>,
    connected: Arc<AtomicBool>,
}

impl WsBus {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Close the socket and stop reconnecting.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }
}

impl RealtimeBus for WsBus {
    fn emit(&mut self, event: ClientEvent) -> std::result::Result<(), BusError> {
        self.command_tx
            .try_send(Command::Emit(event))
            .map_err(|err| match err {
                TrySendError::Full(_) => BusError::Full,
                TrySendError::Closed(_) => BusError::Closed,
            })
    }
}

/// Start the connection task. Must be called from within a tokio runtime.
pub fn connect(config: BusConfig) -> (WsBus, mpsc::Receiver<BusSignal>) {
    let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
    let (signal_tx, signal_rx) = mpsc::channel(config.signal_capacity);
    let connected = Arc::new(AtomicBool::new(false));

    tokio::spawn(connection_loop(
        config,
        Arc::clone(&connected),
        signal_tx,
        command_rx,
    ));

    (
        WsBus {
            command_tx,
            connected,
        },
        signal_rx,
    )
}

#[derive(Debug, PartialEq, Eq)]
enum Exit {
    Reconnect,
    Stop,
}

async fn connection_loop(
    config: BusConfig,
    connected: Arc<AtomicBool>,
    signal_tx: mpsc::Sender<BusSignal>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        info!(url = %config.url, "connecting to room server");

        match tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            tokio_tungstenite::connect_async(&config.url),
        )
        .await
        {
            Ok(Ok((ws_stream, _))) => {
                reconnect_delay = config.reconnect_delay_secs;
                connected.store(true, Ordering::Relaxed);
                if signal_tx.send(BusSignal::Connected).await.is_err() {
                    return;
                }

                let (mut ws_write, mut ws_read) = ws_stream.split();
                let exit = loop {
                    tokio::select! {
                        inbound = ws_read.next() => match inbound {
                            Some(Ok(WsMessage::Text(text))) => match decode(&text) {
                                Ok(event) => {
                                    if signal_tx.send(BusSignal::Event(event)).await.is_err() {
                                        break Exit::Stop;
                                    }
                                }
                                Err(err) => debug!(%err, "unrecognized message from server"),
                            },
                            Some(Ok(WsMessage::Close(_))) | None => {
                                info!("room server closed connection");
                                break Exit::Reconnect;
                            }
                            Some(Err(err)) => {
                                warn!(error = %err, "websocket error");
                                break Exit::Reconnect;
                            }
                            Some(Ok(_)) => {}
                        },
                        command = command_rx.recv() => match command {
                            Some(Command::Emit(event)) => {
                                let name = event.name();
                                match serde_json::to_string(&event) {
                                    Ok(json) => {
                                        if ws_write.send(WsMessage::Text(json.into())).await.is_err() {
                                            warn!(event = name, "send failed");
                                            break Exit::Reconnect;
                                        }
                                    }
                                    Err(err) => error!(%err, event = name, "failed to encode event"),
                                }
                            }
                            Some(Command::Shutdown) | None => {
                                let _ = ws_write.send(WsMessage::Close(None)).await;
                                break Exit::Stop;
                            }
                        },
                    }
                };

                connected.store(false, Ordering::Relaxed);
                let _ = signal_tx.send(BusSignal::Disconnected).await;
                if exit == Exit::Stop {
                    return;
                }
            }
            Ok(Err(err)) => {
                error!(error = %err, "failed to connect to room server");
            }
            Err(_elapsed) => {
                error!(
                    timeout = config.connect_timeout_secs,
                    "connection to room server timed out"
                );
            }
        }

        info!(delay = reconnect_delay, "reconnecting");
        if wait_for_retry(&mut command_rx, reconnect_delay).await == Exit::Stop {
            return;
        }
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// Sleep before the next attempt. Events emitted while offline are dropped.
async fn wait_for_retry(command_rx: &mut mpsc::Receiver<Command>, delay_secs: u64) -> Exit {
    let sleep = tokio::time::sleep(Duration::from_secs(delay_secs));
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Exit::Reconnect,
            command = command_rx.recv() => match command {
                Some(Command::Emit(event)) => {
                    debug!(event = event.name(), "offline, dropping event");
                }
                Some(Command::Shutdown) | None => return Exit::Stop,
            },
        }
    }
}

fn decode(text: &str) -> Result<ServerEvent> {
    Ok(serde_json::from_str(text)?)
}
