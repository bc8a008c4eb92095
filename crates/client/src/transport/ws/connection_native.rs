//! Native/Desktop WebSocket implementation using tokio-tungstenite.

use std::fmt::Display;

use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{Sink, SinkExt, StreamExt};
use relieflink_shared::{ClientMessage, ServerMessage, WS_SUBPROTOCOL};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::{lock, ConnectionState, SharedState};
use crate::config::ReconnectConfig;

/// Start the connection management loop in a background tokio task
pub(super) fn start_connection_loop(
    url: String,
    shared: SharedState,
    mut outbound: UnboundedReceiver<ClientMessage>,
    reconnect_config: ReconnectConfig,
) {
    tokio::spawn(async move {
        let mut attempt = 0u32;

        loop {
            if lock(&shared).is_closed() {
                break;
            }

            {
                let mut s = lock(&shared);
                if attempt == 0 {
                    s.set_state(ConnectionState::Connecting);
                } else {
                    s.set_state(ConnectionState::Reconnecting { attempt });
                }
            }

            let request = match url.as_str().into_client_request() {
                Ok(mut request) => {
                    request
                        .headers_mut()
                        .insert("Sec-WebSocket-Protocol", HeaderValue::from_static(WS_SUBPROTOCOL));
                    request
                }
                Err(e) => {
                    lock(&shared).fail(format!("Invalid WebSocket URL: {}", e));
                    break;
                }
            };

            match connect_async(request).await {
                Ok((ws_stream, _response)) => {
                    attempt = 0;
                    crate::log_info!("WebSocket connected to {}", url);

                    let (mut write, mut read) = ws_stream.split();

                    // Queued start/stop frames are superseded by the replay below.
                    while let Ok(Some(_)) = outbound.try_next() {}
                    if lock(&shared).is_closed() {
                        // Closed while the handshake was in progress.
                        let _ = write.close().await;
                        lock(&shared).set_state(ConnectionState::Disconnected);
                        break;
                    }

                    let mut frames = vec![ClientMessage::ConnectionInit { payload: None }];
                    {
                        let mut s = lock(&shared);
                        s.set_state(ConnectionState::Connected);
                        frames.extend(s.registry.start_messages());
                    }

                    let mut alive = true;
                    for frame in &frames {
                        if let Err(e) = send_frame(&mut write, frame).await {
                            crate::log_error!("Send failed: {}", e);
                            alive = false;
                            break;
                        }
                    }

                    let mut terminated = false;
                    while alive {
                        tokio::select! {
                            incoming = read.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    match serde_json::from_str::<ServerMessage>(text.as_str()) {
                                        Ok(message) => {
                                            let mut s = lock(&shared);
                                            s.registry.dispatch(message);
                                        }
                                        Err(e) => crate::log_error!("Failed to parse message: {}", e),
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => {
                                    crate::log_info!("WebSocket to {} received close frame", url);
                                    alive = false;
                                }
                                Some(Ok(_)) => {
                                    // Ping/pong are answered by tungstenite; binary is unused.
                                }
                                Some(Err(e)) => {
                                    crate::log_error!("WebSocket read error: {}", e);
                                    alive = false;
                                }
                            },
                            command = outbound.next() => match command {
                                Some(frame) => {
                                    let is_terminate = matches!(frame, ClientMessage::ConnectionTerminate);
                                    if let Err(e) = send_frame(&mut write, &frame).await {
                                        crate::log_error!("Send failed: {}", e);
                                        alive = false;
                                    }
                                    if is_terminate {
                                        let _ = write.close().await;
                                        terminated = true;
                                        alive = false;
                                    }
                                }
                                None => {
                                    let _ = write.close().await;
                                    terminated = true;
                                    alive = false;
                                }
                            },
                        }
                    }

                    let finished = {
                        let mut s = lock(&shared);
                        if terminated || s.is_closed() {
                            crate::log_info!("WebSocket to {} terminated", url);
                            true
                        } else {
                            crate::log_warn!("WebSocket to {} dropped, reconnecting", url);
                            s.registry.reset_all("connection lost");
                            false
                        }
                    };
                    lock(&shared).set_state(ConnectionState::Disconnected);
                    if finished {
                        break;
                    }

                    attempt = 1;
                    tokio::time::sleep(tokio::time::Duration::from_millis(
                        reconnect_config.delay_for_attempt(0) as u64,
                    ))
                    .await;
                }
                Err(e) => {
                    crate::log_error!("WebSocket error for {}: {}", url, e);

                    if !reconnect_config.allows(attempt) {
                        lock(&shared).fail(format!(
                            "Max reconnect attempts ({}) exceeded",
                            reconnect_config.max_attempts
                        ));
                        break;
                    }

                    let delay = reconnect_config.delay_for_attempt(attempt);
                    crate::log_info!(
                        "Reconnecting to {} in {}ms (attempt {})",
                        url,
                        delay,
                        attempt + 1
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay as u64)).await;
                    attempt += 1;
                }
            }
        }
    });
}

async fn send_frame<S>(write: &mut S, frame: &ClientMessage) -> Result<(), String>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(frame).map_err(|e| format!("Serialize failed: {}", e))?;
    crate::log_debug!("Sending: {}", json);
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}
