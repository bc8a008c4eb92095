//! In-memory channels for tests: every network call is recorded and answered
//! by the test, in whatever order it chooses.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_channel::oneshot;
use relieflink_shared::{GraphQLResponse, Operation, TransportError};
use serde_json::Value;

use super::{
    ConnectionState, EphemeralChannel, PersistentChannel, SubscriptionItem, SubscriptionStream,
};

type Reply = Result<GraphQLResponse, TransportError>;

/// Ephemeral channel whose requests stay pending until `resolve` is called.
#[derive(Default)]
pub(crate) struct ScriptedChannel {
    calls: RefCell<Vec<Operation>>,
    pending: RefCell<Vec<Option<oneshot::Sender<Reply>>>>,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub(crate) fn call(&self, index: usize) -> Operation {
        self.calls.borrow()[index].clone()
    }

    /// Answer the `index`-th call (in issue order).
    pub(crate) fn resolve(&self, index: usize, reply: Reply) {
        let sender = self.pending.borrow_mut()[index]
            .take()
            .expect("call already resolved");
        let _ = sender.send(reply);
    }

    pub(crate) fn resolve_data(&self, index: usize, data: Value) {
        self.resolve(index, Ok(GraphQLResponse::from_data(data)));
    }
}

#[async_trait(?Send)]
impl EphemeralChannel for ScriptedChannel {
    async fn execute(&self, operation: &Operation) -> Result<GraphQLResponse, TransportError> {
        let (tx, rx) = oneshot::channel();
        self.calls.borrow_mut().push(operation.clone());
        self.pending.borrow_mut().push(Some(tx));
        rx.await
            .unwrap_or_else(|_| Err(TransportError::Network("test dropped the reply".into())))
    }
}

/// Persistent channel that hands the test a sender per subscription.
#[derive(Default)]
pub(crate) struct ScriptedStream {
    sinks: RefCell<Vec<(Operation, UnboundedSender<SubscriptionItem>)>>,
    stopped: Rc<Cell<usize>>,
    closed: Cell<bool>,
}

impl ScriptedStream {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.sinks.borrow().len()
    }

    pub(crate) fn stopped(&self) -> usize {
        self.stopped.get()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.get()
    }

    pub(crate) fn push(&self, index: usize, item: SubscriptionItem) {
        let _ = self.sinks.borrow()[index].1.unbounded_send(item);
    }

    pub(crate) fn push_data(&self, index: usize, data: Value) {
        self.push(index, Ok(GraphQLResponse::from_data(data)));
    }
}

impl PersistentChannel for ScriptedStream {
    fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream, TransportError> {
        if self.closed.get() {
            return Err(TransportError::StreamReset("channel closed".into()));
        }
        let (tx, rx) = unbounded();
        let id = self.sinks.borrow().len().to_string();
        self.sinks.borrow_mut().push((operation.clone(), tx));
        let stopped = self.stopped.clone();
        Ok(SubscriptionStream::new(id, rx).on_drop(move |_| stopped.set(stopped.get() + 1)))
    }

    fn state(&self) -> ConnectionState {
        if self.closed.get() {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Connected
        }
    }

    fn close(&self) {
        self.closed.set(true);
        self.sinks.borrow_mut().clear();
    }
}

/// Let every spawned local task run until it blocks again.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
