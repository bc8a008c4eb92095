use dioxus::prelude::*;
use futures_util::StreamExt;
use relieflink_shared::{ClientError, Operation};
use serde_json::Value;

use crate::cache::CacheSnapshot;
use crate::client::Client;
use crate::provider::use_client;

/// Reactive view of one query's cache entry.
#[derive(Clone)]
pub struct QueryHandle {
    snapshot: Signal<CacheSnapshot>,
    operation: Signal<Operation>,
    client: Client,
}

impl QueryHandle {
    pub fn data(&self) -> Option<Value> {
        self.snapshot.read().data.clone()
    }

    pub fn loading(&self) -> bool {
        self.snapshot.read().loading
    }

    pub fn error(&self) -> Option<ClientError> {
        self.snapshot.read().error.clone()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        self.snapshot.cloned()
    }

    /// Re-issue the query, bypassing the stored value.
    pub fn refetch(&self) {
        let operation = self.operation.peek().clone();
        // The cache drives the request; the returned future is not needed.
        let _ = self.client.cache().refetch(&operation);
    }
}

/// Watch `operation`'s cache entry and execute it (cache-first). A changed
/// operation switches to the new entry.
pub fn use_query(operation: Operation) -> QueryHandle {
    let client = use_client();
    let snapshot = use_signal(CacheSnapshot::default);
    let mut tracked = use_signal(|| operation.clone());
    if *tracked.peek() != operation {
        tracked.set(operation);
    }

    let watcher = client.clone();
    use_resource(move || {
        let operation = tracked();
        let client = watcher.clone();
        let mut snapshot = snapshot;
        async move {
            let mut changes = client.watch(&operation.cache_key());
            let _ = client.cache().execute(&operation);
            while let Some(next) = changes.next().await {
                snapshot.set(next);
            }
        }
    });

    QueryHandle {
        snapshot,
        operation: tracked,
        client,
    }
}

/// Latest pushed result of a subscription.
pub fn use_subscription(operation: Operation) -> Signal<CacheSnapshot> {
    let client = use_client();
    let snapshot = use_signal(CacheSnapshot::default);

    use_future(move || {
        let mut changes = client.subscribe(&operation);
        let mut snapshot = snapshot;
        async move {
            while let Some(next) = changes.next().await {
                snapshot.set(next);
            }
        }
    });

    snapshot
}
