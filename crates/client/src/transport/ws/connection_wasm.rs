//! WASM/Web-specific WebSocket implementation using web_sys::WebSocket.

use futures_channel::mpsc::{unbounded, UnboundedReceiver};
use futures_util::future::{self, Either};
use futures_util::StreamExt;
use relieflink_shared::{ClientMessage, ServerMessage, WS_SUBPROTOCOL};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::js_sys;
use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

use super::{lock, ConnectionState, SharedState};
use crate::config::ReconnectConfig;

/// Start the connection management loop
pub(super) fn start_connection_loop(
    url: String,
    shared: SharedState,
    mut outbound: UnboundedReceiver<ClientMessage>,
    reconnect_config: ReconnectConfig,
) {
    spawn_local(async move {
        let mut attempt = 0u32;

        loop {
            if lock(&shared).is_closed() {
                break;
            }

            if attempt == 0 {
                lock(&shared).set_state(ConnectionState::Connecting);
            } else {
                lock(&shared).set_state(ConnectionState::Reconnecting { attempt });
            }

            match connect_websocket(&url, shared.clone()).await {
                Ok((ws, mut close_rx)) => {
                    attempt = 0;
                    crate::log_info!("WebSocket connected to {}", url);

                    // Queued start/stop frames are superseded by the replay below.
                    while let Ok(Some(_)) = outbound.try_next() {}
                    if lock(&shared).is_closed() {
                        // Closed while the handshake was in progress.
                        let _ = ws.close();
                        lock(&shared).set_state(ConnectionState::Disconnected);
                        break;
                    }

                    let mut frames = vec![ClientMessage::ConnectionInit { payload: None }];
                    {
                        let mut s = lock(&shared);
                        s.set_state(ConnectionState::Connected);
                        frames.extend(s.registry.start_messages());
                    }
                    for frame in &frames {
                        send_frame(&ws, frame);
                    }

                    let mut terminated = false;
                    loop {
                        match future::select(outbound.next(), close_rx.next()).await {
                            Either::Left((Some(frame), _)) => {
                                // readyState 1 = OPEN
                                if ws.ready_state() != WebSocket::OPEN {
                                    crate::log_info!("WebSocket no longer open");
                                    break;
                                }
                                let is_terminate =
                                    matches!(frame, ClientMessage::ConnectionTerminate);
                                send_frame(&ws, &frame);
                                if is_terminate {
                                    let _ = ws.close();
                                    terminated = true;
                                    break;
                                }
                            }
                            Either::Left((None, _)) => {
                                let _ = ws.close();
                                terminated = true;
                                break;
                            }
                            Either::Right(_) => break,
                        }
                    }

                    ws.set_onmessage(None);
                    ws.set_onclose(None);
                    ws.set_onerror(None);

                    let finished = {
                        let mut s = lock(&shared);
                        if terminated || s.is_closed() {
                            true
                        } else {
                            crate::log_warn!("WebSocket to {} dropped, reconnecting", url);
                            s.registry.reset_all("connection lost");
                            false
                        }
                    };
                    lock(&shared).set_state(ConnectionState::Disconnected);
                    if finished {
                        crate::log_info!("WebSocket to {} terminated", url);
                        break;
                    }

                    attempt = 1;
                    gloo_timers::future::TimeoutFuture::new(reconnect_config.delay_for_attempt(0))
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
                    gloo_timers::future::TimeoutFuture::new(delay).await;
                    attempt += 1;
                }
            }
        }
    });
}

fn send_frame(ws: &WebSocket, frame: &ClientMessage) {
    match serde_json::to_string(frame) {
        Ok(json) => {
            crate::log_debug!("Sending: {}", json);
            if let Err(e) = ws.send_with_str(&json) {
                crate::log_error!("Send failed: {:?}", e);
            }
        }
        Err(e) => crate::log_error!("Serialize failed: {}", e),
    }
}

/// Open a socket and wire its handlers. Resolves once the socket is open;
/// the returned receiver fires when it closes.
async fn connect_websocket(
    url: &str,
    shared: SharedState,
) -> Result<(WebSocket, UnboundedReceiver<()>), String> {
    use std::cell::RefCell;
    use std::rc::Rc;

    let ws = WebSocket::new_with_str(url, WS_SUBPROTOCOL)
        .map_err(|e| format!("Failed to create WebSocket: {:?}", e))?;

    let is_open = Rc::new(RefCell::new(false));
    let error_reason = Rc::new(RefCell::new(None::<String>));
    let (close_tx, close_rx) = unbounded::<()>();

    let is_open_clone = is_open.clone();
    let onopen_callback = Closure::wrap(Box::new(move |_: web_sys::Event| {
        *is_open_clone.borrow_mut() = true;
    }) as Box<dyn FnMut(web_sys::Event)>);
    ws.set_onopen(Some(onopen_callback.as_ref().unchecked_ref()));
    onopen_callback.forget();

    let error_reason_close = error_reason.clone();
    let onclose_callback = Closure::wrap(Box::new(move |e: CloseEvent| {
        let reason = if e.reason().is_empty() {
            format!("Code {}", e.code())
        } else {
            e.reason()
        };
        crate::log_info!("WebSocket onclose: {}", reason);
        *error_reason_close.borrow_mut() = Some(reason);
        let _ = close_tx.unbounded_send(());
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(onclose_callback.as_ref().unchecked_ref()));
    onclose_callback.forget();

    let error_reason_err = error_reason.clone();
    let onerror_callback = Closure::wrap(Box::new(move |_: ErrorEvent| {
        crate::log_error!("WebSocket onerror fired");
        *error_reason_err.borrow_mut() = Some("WebSocket error".to_string());
    }) as Box<dyn FnMut(ErrorEvent)>);
    ws.set_onerror(Some(onerror_callback.as_ref().unchecked_ref()));
    onerror_callback.forget();

    let onmessage_callback = Closure::wrap(Box::new(move |e: MessageEvent| {
        if let Ok(text) = e.data().dyn_into::<js_sys::JsString>() {
            let text: String = text.into();
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(message) => lock(&shared).registry.dispatch(message),
                Err(err) => crate::log_error!("Failed to parse message: {}", err),
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(onmessage_callback.as_ref().unchecked_ref()));
    onmessage_callback.forget();

    // Wait for connection to open (5 second timeout)
    for _ in 0..500 {
        if *is_open.borrow() {
            return Ok((ws, close_rx));
        }
        if let Some(reason) = error_reason.borrow().clone() {
            return Err(reason);
        }
        gloo_timers::future::TimeoutFuture::new(10).await;
    }

    let _ = ws.close();
    Err("Connection timeout".to_string())
}
