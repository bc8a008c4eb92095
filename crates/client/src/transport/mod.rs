//! Network channels carrying GraphQL operations.
//!
//! Two channel kinds exist:
//! - [`EphemeralChannel`]: one request/response exchange per operation
//!   (queries and mutations, see [`http::HttpChannel`]).
//! - [`PersistentChannel`]: one long-lived connection multiplexing many
//!   subscriptions, reconnecting on drop (see [`ws::WsChannel`]).

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::{Stream, StreamExt};
use relieflink_shared::{GraphQLResponse, Operation, TransportError};

pub mod http;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use ws::ConnectionState;

/// One message pushed on a subscription, or the transport failing under it.
pub type SubscriptionItem = Result<GraphQLResponse, TransportError>;

/// Request/response transport for queries and mutations.
#[async_trait(?Send)]
pub trait EphemeralChannel {
    async fn execute(&self, operation: &Operation) -> Result<GraphQLResponse, TransportError>;
}

/// Streaming transport for subscriptions.
pub trait PersistentChannel {
    /// Start a subscription. The returned stream yields every pushed message
    /// until the server completes it; dropping it stops the subscription.
    fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream, TransportError>;

    fn state(&self) -> ConnectionState;

    /// Terminate the connection and end every open subscription.
    fn close(&self);
}

/// A lazy sequence of messages for one subscription.
pub struct SubscriptionStream {
    id: String,
    receiver: UnboundedReceiver<SubscriptionItem>,
    on_drop: Option<Box<dyn FnOnce(&str)>>,
}

impl SubscriptionStream {
    pub fn new(id: String, receiver: UnboundedReceiver<SubscriptionItem>) -> Self {
        Self {
            id,
            receiver,
            on_drop: None,
        }
    }

    /// Run `f` with the subscription id when the stream is dropped.
    pub fn on_drop(mut self, f: impl FnOnce(&str) + 'static) -> Self {
        self.on_drop = Some(Box::new(f));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for SubscriptionStream {
    type Item = SubscriptionItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(&self.id);
        }
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream").field("id", &self.id).finish()
    }
}
