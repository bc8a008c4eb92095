//! GraphQL over WebSocket: one persistent connection carrying every subscription.
//!
//! # Architecture
//!
//! ```text
//!   subscribe() ──► SubscriptionRegistry ◄── connection loop (native / wasm)
//!        │              │   ▲                    │        ▲
//!        │   start/stop │   │ data/error/complete│        │ reconnect with
//!        ▼              ▼   │                    ▼        │ backoff, replay
//!  SubscriptionStream ◄─────┘               outbound queue  every `start`
//! ```
//!
//! The registry outlives individual sockets. After a reconnect the loop sends
//! `connection_init` followed by a `start` for every live subscription, so a
//! consumer keeps reading the same stream. Messages pushed while the socket
//! was down are lost.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use relieflink_shared::{
    ClientMessage, GraphQLError, GraphQLRequest, GraphQLResponse, Operation, ServerMessage,
    TransportError,
};
use serde_json::Value;
use url::Url;

use super::{PersistentChannel, SubscriptionItem, SubscriptionStream};
use crate::config::ReconnectConfig;

#[cfg(target_arch = "wasm32")]
mod connection_wasm;
#[cfg(target_arch = "wasm32")]
use connection_wasm::start_connection_loop;

#[cfg(not(target_arch = "wasm32"))]
mod connection_native;
#[cfg(not(target_arch = "wasm32"))]
use connection_native::start_connection_loop;

/// Connection state for a WebSocket
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed { reason: String },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Reconnecting { .. }
        )
    }
}

struct ActiveSubscription {
    seq: u64,
    request: GraphQLRequest,
    sink: UnboundedSender<SubscriptionItem>,
}

/// Live subscriptions by id, independent of any particular socket.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    next_seq: u64,
    active: HashMap<String, ActiveSubscription>,
}

impl SubscriptionRegistry {
    pub(crate) fn register(
        &mut self,
        request: GraphQLRequest,
    ) -> (String, UnboundedReceiver<SubscriptionItem>) {
        let id = uuid::Uuid::new_v4().to_string();
        let (sink, receiver) = unbounded();
        self.next_seq += 1;
        self.active.insert(
            id.clone(),
            ActiveSubscription {
                seq: self.next_seq,
                request,
                sink,
            },
        );
        (id, receiver)
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        self.active.remove(id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn start_message(&self, id: &str) -> Option<ClientMessage> {
        self.active.get(id).map(|sub| ClientMessage::Start {
            id: id.to_string(),
            payload: sub.request.clone(),
        })
    }

    /// `start` frames for every live subscription, oldest first.
    pub(crate) fn start_messages(&self) -> Vec<ClientMessage> {
        let mut subs: Vec<(&String, &ActiveSubscription)> = self.active.iter().collect();
        subs.sort_by_key(|(_, sub)| sub.seq);
        subs.into_iter()
            .map(|(id, sub)| ClientMessage::Start {
                id: id.clone(),
                payload: sub.request.clone(),
            })
            .collect()
    }

    /// Route one server frame to the subscription it belongs to.
    pub(crate) fn dispatch(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Data { id, payload } => {
                let closed = match self.active.get(&id) {
                    Some(sub) => sub.sink.unbounded_send(Ok(payload)).is_err(),
                    None => {
                        crate::log_debug!("Dropping data for unknown subscription {}", id);
                        false
                    }
                };
                if closed {
                    self.active.remove(&id);
                }
            }
            ServerMessage::Error { id, payload } => {
                if let Some(sub) = self.active.remove(&id) {
                    let _ = sub.sink.unbounded_send(Ok(GraphQLResponse {
                        data: None,
                        errors: errors_from_payload(payload),
                    }));
                }
            }
            ServerMessage::Complete { id } => {
                self.remove(&id);
            }
            ServerMessage::ConnectionError { payload } => {
                crate::log_error!("Subscription server refused connection: {:?}", payload);
            }
            ServerMessage::ConnectionAck | ServerMessage::KeepAlive => {}
        }
    }

    /// Report a dropped socket to every subscription without ending them.
    pub(crate) fn reset_all(&mut self, reason: &str) {
        self.active.retain(|_, sub| {
            sub.sink
                .unbounded_send(Err(TransportError::StreamReset(reason.to_string())))
                .is_ok()
        });
    }

    /// Report a final failure and end every subscription.
    pub(crate) fn close_all(&mut self, reason: &str) {
        for (_, sub) in self.active.drain() {
            let _ = sub
                .sink
                .unbounded_send(Err(TransportError::StreamReset(reason.to_string())));
        }
    }
}

/// Errors carried in an `error` frame: a list, a single error, or anything else.
fn errors_from_payload(payload: Option<Value>) -> Vec<GraphQLError> {
    let Some(payload) = payload else {
        return vec![GraphQLError::new("subscription failed")];
    };
    if let Ok(errors) = serde_json::from_value::<Vec<GraphQLError>>(payload.clone()) {
        return errors;
    }
    if let Ok(error) = serde_json::from_value::<GraphQLError>(payload.clone()) {
        return vec![error];
    }
    vec![GraphQLError::new(payload.to_string())]
}

/// State shared between the channel handle, its streams and the connection loop.
#[derive(Default)]
pub(crate) struct ChannelShared {
    pub(crate) registry: SubscriptionRegistry,
    state: ConnectionState,
    state_watchers: Vec<UnboundedSender<ConnectionState>>,
    closed: bool,
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl ChannelShared {
    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        crate::log_debug!("Subscription channel state: {:?}", state);
        self.state = state.clone();
        self.state_watchers
            .retain(|w| w.unbounded_send(state.clone()).is_ok());
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Give up reconnecting: end every subscription and refuse new ones.
    pub(crate) fn fail(&mut self, reason: String) {
        self.closed = true;
        self.registry.close_all(&reason);
        self.set_state(ConnectionState::Failed { reason });
    }
}

pub(crate) type SharedState = Arc<Mutex<ChannelShared>>;

pub(crate) fn lock(shared: &SharedState) -> MutexGuard<'_, ChannelShared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Persistent subscription channel over a single auto-reconnecting WebSocket.
pub struct WsChannel {
    endpoint: Url,
    shared: SharedState,
    outbound: UnboundedSender<ClientMessage>,
}

impl WsChannel {
    /// Create the channel and start its connection loop in the background.
    pub fn connect(endpoint: Url, reconnect: ReconnectConfig) -> Self {
        let (outbound, receiver) = unbounded();
        let shared: SharedState = Arc::default();

        start_connection_loop(endpoint.to_string(), shared.clone(), receiver, reconnect);

        Self {
            endpoint,
            shared,
            outbound,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Receive every future connection state change.
    pub fn state_changes(&self) -> UnboundedReceiver<ConnectionState> {
        let (tx, rx) = unbounded();
        let mut shared = lock(&self.shared);
        let _ = tx.unbounded_send(shared.state.clone());
        shared.state_watchers.push(tx);
        rx
    }

    #[cfg(test)]
    fn detached() -> (Self, UnboundedReceiver<ClientMessage>) {
        let (outbound, receiver) = unbounded();
        let channel = Self {
            endpoint: Url::parse("ws://localhost/graphql").expect("static url"),
            shared: Arc::default(),
            outbound,
        };
        (channel, receiver)
    }
}

impl PersistentChannel for WsChannel {
    fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream, TransportError> {
        let (id, receiver) = {
            let mut shared = lock(&self.shared);
            if shared.closed {
                return Err(TransportError::StreamReset("channel closed".to_string()));
            }
            let (id, receiver) = shared.registry.register(operation.to_request());
            // While disconnected the connection loop replays the start itself.
            if shared.state.is_connected() {
                if let Some(start) = shared.registry.start_message(&id) {
                    let _ = self.outbound.unbounded_send(start);
                }
            }
            (id, receiver)
        };
        crate::log_info!("Subscribing to {} as {}", operation.name(), id);

        let shared = Arc::clone(&self.shared);
        let outbound = self.outbound.clone();
        Ok(SubscriptionStream::new(id, receiver).on_drop(move |id| {
            let mut shared = lock(&shared);
            if shared.registry.remove(id) && shared.state.is_connected() {
                let _ = outbound.unbounded_send(ClientMessage::Stop { id: id.to_string() });
            }
        }))
    }

    fn state(&self) -> ConnectionState {
        lock(&self.shared).state.clone()
    }

    fn close(&self) {
        {
            let mut shared = lock(&self.shared);
            if shared.closed {
                return;
            }
            shared.closed = true;
            shared.registry.close_all("channel closed");
        }
        crate::log_info!("Closing subscription channel to {}", self.endpoint);
        let _ = self.outbound.unbounded_send(ClientMessage::ConnectionTerminate);
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.close();
    }
}
