//! Normalized response cache with in-flight deduplication.
//!
//! Entries are keyed by [`CacheKey`] (operation name + canonical parameters)
//! and shared by every operation whatever channel served it. The cache is
//! the only code that mutates entries.
//!
//! Invariants:
//! - at most one network request is in flight per key; later identical
//!   requests attach to it and resolve to the same result;
//! - an invalidated entry is never served by [`NormalizedCache::execute`];
//! - a request that fails before the server answers is not cached;
//! - a subscription push replaces the entry's value, it never merges.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::future::{self, LocalBoxFuture, Shared};
use futures_util::{FutureExt, StreamExt};
use relieflink_shared::{
    CacheKey, ClientError, GraphQLResponse, Operation, OperationKind, TransportError,
};
use serde_json::Value;

use crate::link::{Link, ObservedStream};
use crate::runtime::Spawner;

/// Outcome of one operation as seen by callers: failures are data, not `Err`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResult {
    pub data: Option<Value>,
    pub error: Option<ClientError>,
}

impl OperationResult {
    pub fn failed(error: ClientError) -> Self {
        Self {
            data: None,
            error: Some(error),
        }
    }

    /// Protocol errors keep whatever partial data came with them.
    pub fn from_response(response: GraphQLResponse) -> Self {
        let error = if response.errors.is_empty() {
            None
        } else {
            Some(ClientError::Protocol(response.errors))
        };
        Self {
            data: response.data,
            error,
        }
    }

    pub fn from_outcome(outcome: Result<GraphQLResponse, ClientError>) -> Self {
        match outcome {
            Ok(response) => Self::from_response(response),
            Err(error) => Self::failed(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// What a UI binding sees for one cache key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSnapshot {
    pub data: Option<Value>,
    pub error: Option<ClientError>,
    pub loading: bool,
    /// Bumped on every write to the entry.
    pub version: u64,
}

impl CacheSnapshot {
    pub fn into_result(self) -> OperationResult {
        OperationResult {
            data: self.data,
            error: self.error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Serve a stored, non-invalidated value without touching the network.
    CacheFirst,
    /// Always go to the network (still joining an in-flight request).
    NetworkOnly,
}

type InFlight = Shared<LocalBoxFuture<'static, OperationResult>>;

#[derive(Default)]
struct CacheEntry {
    operation: Option<Operation>,
    result: Option<OperationResult>,
    version: u64,
    invalidated: bool,
    in_flight: Option<InFlight>,
    streaming: bool,
    watchers: Vec<UnboundedSender<CacheSnapshot>>,
}

impl CacheEntry {
    fn snapshot(&self) -> CacheSnapshot {
        let (data, error) = match &self.result {
            Some(result) => (result.data.clone(), result.error.clone()),
            None => (None, None),
        };
        CacheSnapshot {
            data,
            error,
            loading: self.in_flight.is_some() || (self.streaming && self.result.is_none()),
            version: self.version,
        }
    }

    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.watchers
            .retain(|w| w.unbounded_send(snapshot.clone()).is_ok());
    }

    fn store(&mut self, result: OperationResult) {
        self.result = Some(result);
        self.invalidated = false;
        self.version += 1;
        self.notify();
    }

    /// A request that never got an answer: earlier data stays visible and
    /// the entry is left stale so the next `execute` asks again.
    fn fail(&mut self, error: ClientError) {
        self.result = Some(OperationResult {
            data: self.result.as_ref().and_then(|r| r.data.clone()),
            error: Some(error),
        });
        self.invalidated = true;
        self.version += 1;
        self.notify();
    }

    fn apply_push(&mut self, item: Result<GraphQLResponse, TransportError>) {
        let result = match item {
            Ok(response) => OperationResult::from_response(response),
            // A dropped stream keeps the last pushed data visible.
            Err(error) => OperationResult {
                data: self.result.as_ref().and_then(|r| r.data.clone()),
                error: Some(error.into()),
            },
        };
        self.store(result);
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    closed: bool,
}

/// The single shared mutable store behind every operation.
#[derive(Clone)]
pub struct NormalizedCache {
    state: Rc<RefCell<CacheState>>,
    link: Link,
    spawner: Spawner,
}

impl NormalizedCache {
    pub fn new(link: Link, spawner: Spawner) -> Self {
        Self {
            state: Rc::default(),
            link,
            spawner,
        }
    }

    pub fn get(&self, key: &CacheKey) -> CacheSnapshot {
        self.state
            .borrow()
            .entries
            .get(key)
            .map(CacheEntry::snapshot)
            .unwrap_or_default()
    }

    /// Receive the current snapshot now and every later change.
    pub fn watch(&self, key: &CacheKey) -> UnboundedReceiver<CacheSnapshot> {
        let (tx, rx) = unbounded();
        let mut state = self.state.borrow_mut();
        if state.closed {
            return rx;
        }
        let entry = state.entries.entry(key.clone()).or_default();
        let _ = tx.unbounded_send(entry.snapshot());
        entry.watchers.push(tx);
        rx
    }

    /// Run an operation: queries are cache-first and deduplicated, mutations
    /// always hit the network, subscriptions resolve with their next push.
    pub fn execute(&self, operation: &Operation) -> LocalBoxFuture<'static, OperationResult> {
        match operation.kind() {
            OperationKind::Query => self.fetch(operation, FetchPolicy::CacheFirst),
            OperationKind::Mutation => self.mutate(operation),
            OperationKind::Subscription => self.next_push(operation),
        }
    }

    /// Like `execute`, but a query never reuses a stored value.
    pub fn refetch(&self, operation: &Operation) -> LocalBoxFuture<'static, OperationResult> {
        match operation.kind() {
            OperationKind::Query => self.fetch(operation, FetchPolicy::NetworkOnly),
            _ => self.execute(operation),
        }
    }

    pub fn fetch(
        &self,
        operation: &Operation,
        policy: FetchPolicy,
    ) -> LocalBoxFuture<'static, OperationResult> {
        let key = operation.cache_key();
        let mut state = self.state.borrow_mut();
        if state.closed {
            return future::ready(OperationResult::failed(ClientError::Shutdown)).boxed_local();
        }
        let entry = state.entries.entry(key.clone()).or_default();
        entry.operation = Some(operation.clone());

        if let Some(in_flight) = &entry.in_flight {
            crate::log_debug!("Joining in-flight request for {}", key);
            return in_flight.clone().boxed_local();
        }
        if policy == FetchPolicy::CacheFirst && !entry.invalidated {
            if let Some(result) = &entry.result {
                return future::ready(result.clone()).boxed_local();
            }
        }

        let request = self.request(key, operation.clone()).shared();
        entry.in_flight = Some(request.clone());
        entry.notify();
        drop(state);

        // Driven to completion even if every caller stops waiting.
        self.spawner.spawn(request.clone().map(|_| ()));
        request.boxed_local()
    }

    fn request(&self, key: CacheKey, operation: Operation) -> LocalBoxFuture<'static, OperationResult> {
        let link = self.link.clone();
        let state = Rc::downgrade(&self.state);
        async move {
            let result = OperationResult::from_outcome(link.request(&operation).await);
            if let Some(cell) = state.upgrade() {
                let mut state = cell.borrow_mut();
                if let Some(entry) = state.entries.get_mut(&key) {
                    entry.in_flight = None;
                    match &result.error {
                        Some(error) if !matches!(error, ClientError::Protocol(_)) => {
                            entry.fail(error.clone())
                        }
                        _ => entry.store(result.clone()),
                    }
                }
            }
            result
        }
        .boxed_local()
    }

    fn mutate(&self, operation: &Operation) -> LocalBoxFuture<'static, OperationResult> {
        if self.state.borrow().closed {
            return future::ready(OperationResult::failed(ClientError::Shutdown)).boxed_local();
        }
        let cache = self.clone();
        let operation = operation.clone();
        let request = async move {
            let result = OperationResult::from_outcome(cache.link.request(&operation).await);
            if result.is_ok() {
                for name in operation.refetched_queries() {
                    cache.invalidate_named(name);
                }
            }
            result
        }
        .boxed_local()
        .shared();
        self.spawner.spawn(request.clone().map(|_| ()));
        request.boxed_local()
    }

    /// Mark one entry stale so the next `execute` goes to the network.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        match self.state.borrow_mut().entries.get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        }
    }

    /// Invalidate every entry of the named query; entries someone is
    /// watching are refetched right away.
    pub fn invalidate_named(&self, name: &str) -> usize {
        let mut refetch = Vec::new();
        let mut count = 0;
        {
            let mut state = self.state.borrow_mut();
            for (key, entry) in state.entries.iter_mut() {
                if key.name() != name {
                    continue;
                }
                entry.invalidated = true;
                count += 1;
                entry.watchers.retain(|w| !w.is_closed());
                if let Some(op) = &entry.operation {
                    if op.kind() == OperationKind::Query
                        && !entry.watchers.is_empty()
                        && entry.in_flight.is_none()
                    {
                        refetch.push(op.clone());
                    }
                }
            }
        }
        for op in refetch {
            // `fetch` spawns the request itself.
            let _ = self.fetch(&op, FetchPolicy::NetworkOnly);
        }
        count
    }

    /// Watch a subscription's entry, starting its stream if nobody has yet.
    pub fn subscribe(&self, operation: &Operation) -> UnboundedReceiver<CacheSnapshot> {
        let key = operation.cache_key();
        self.ensure_stream(operation, &key);
        self.watch(&key)
    }

    fn next_push(&self, operation: &Operation) -> LocalBoxFuture<'static, OperationResult> {
        let key = operation.cache_key();
        let seen = self.get(&key).version;
        let mut receiver = self.subscribe(operation);
        async move {
            while let Some(snapshot) = receiver.next().await {
                if snapshot.version > seen {
                    return snapshot.into_result();
                }
            }
            OperationResult::failed(ClientError::Shutdown)
        }
        .boxed_local()
    }

    fn ensure_stream(&self, operation: &Operation, key: &CacheKey) {
        {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return;
            }
            let entry = state.entries.entry(key.clone()).or_default();
            if entry.streaming {
                return;
            }
            entry.streaming = true;
            entry.operation = Some(operation.clone());
            entry.notify();
        }

        match self.link.subscribe(operation) {
            Ok(stream) => {
                self.spawner
                    .spawn(pump(Rc::downgrade(&self.state), key.clone(), stream));
            }
            Err(error) => {
                let mut state = self.state.borrow_mut();
                if let Some(entry) = state.entries.get_mut(key) {
                    entry.streaming = false;
                    entry.store(OperationResult::failed(error));
                }
            }
        }
    }

    /// Drop every entry and refuse further work. Pending watchers see their
    /// streams end.
    pub fn shutdown(&self) {
        let mut state = self.state.borrow_mut();
        state.closed = true;
        state.entries.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.borrow().closed
    }
}

/// Sole consumer of a subscription stream: fans each push out to watchers.
async fn pump(state: Weak<RefCell<CacheState>>, key: CacheKey, mut stream: ObservedStream) {
    while let Some(item) = stream.next().await {
        let Some(cell) = state.upgrade() else {
            return;
        };
        let mut state = cell.borrow_mut();
        let Some(entry) = state.entries.get_mut(&key) else {
            return;
        };
        entry.apply_push(item);
        if entry.watchers.is_empty() {
            // Dropping the stream stops the subscription upstream.
            entry.streaming = false;
            return;
        }
    }

    if let Some(cell) = state.upgrade() {
        if let Some(entry) = cell.borrow_mut().entries.get_mut(&key) {
            entry.streaming = false;
            entry.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::ErrorInterceptor;
    use crate::router::OperationRouter;
    use crate::transport::testing::{settle, ScriptedChannel, ScriptedStream};
    use relieflink_shared::GraphQLError;
    use serde_json::json;
    use tokio::task::LocalSet;

    fn cache_with(http: &Rc<ScriptedChannel>, ws: &Rc<ScriptedStream>) -> NormalizedCache {
        let router = OperationRouter::new()
            .with_ephemeral(http.clone())
            .with_persistent(ws.clone());
        NormalizedCache::new(
            Link::new(router, ErrorInterceptor::default()),
            Spawner::default(),
        )
    }

    fn city_query(where_clause: Value) -> Operation {
        Operation::query("City", "query City($where: city_bool_exp) { city(where: $where) { id name } }")
            .with_parameter("where", where_clause)
    }

    fn cities() -> Value {
        json!({ "city": [{ "id": 1, "name": "Cityville" }] })
    }

    #[tokio::test]
    async fn identical_requests_share_one_network_call() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);

                // Distinct instances, structurally equal parameters.
                let first = cache.execute(&city_query(json!({ "districtId": { "_eq": 7 } })));
                let second = cache.execute(&city_query(json!({ "districtId": { "_eq": 7 } })));
                settle().await;
                assert_eq!(http.call_count(), 1);

                http.resolve_data(0, cities());
                let (a, b) = futures_util::join!(first, second);
                assert_eq!(a, b);
                assert_eq!(a.data, Some(cities()));
                assert_eq!(http.call_count(), 1);
            })
            .await;
    }

    #[tokio::test]
    async fn stored_value_is_served_until_invalidated() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({ "districtId": { "_eq": 7 } }));

                let pending = cache.execute(&op);
                settle().await;
                http.resolve_data(0, cities());
                pending.await;

                let again = cache.execute(&op).await;
                assert_eq!(again.data, Some(cities()));
                assert_eq!(http.call_count(), 1, "fresh entry served from cache");

                assert!(cache.invalidate(&op.cache_key()));
                let pending = cache.execute(&op);
                settle().await;
                assert_eq!(http.call_count(), 2, "invalidated entry goes to the network");
                http.resolve_data(1, json!({ "city": [] }));
                assert_eq!(pending.await.data, Some(json!({ "city": [] })));

                // Served from cache again once refreshed.
                cache.execute(&op).await;
                assert_eq!(http.call_count(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn refetch_bypasses_a_fresh_value() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));

                let pending = cache.execute(&op);
                settle().await;
                http.resolve_data(0, cities());
                pending.await;

                let pending = cache.refetch(&op);
                settle().await;
                assert_eq!(http.call_count(), 2);
                http.resolve_data(1, cities());
                pending.await;
            })
            .await;
    }

    #[tokio::test]
    async fn transport_failure_is_a_result_not_a_retry() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));

                let pending = cache.execute(&op);
                settle().await;
                assert!(cache.get(&op.cache_key()).loading);
                http.resolve(0, Err(TransportError::Timeout(30_000)));

                let result = pending.await;
                assert!(result.data.is_none());
                assert_eq!(
                    result.error,
                    Some(ClientError::Transport(TransportError::Timeout(30_000)))
                );
                settle().await;
                assert_eq!(http.call_count(), 1);
                assert!(!cache.get(&op.cache_key()).loading);
            })
            .await;
    }

    #[tokio::test]
    async fn failed_request_is_asked_again_by_the_next_execute() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({ "districtId": { "_eq": 7 } }));

                let pending = cache.execute(&op);
                settle().await;
                http.resolve(0, Err(TransportError::Timeout(30_000)));
                assert!(pending.await.error.unwrap().is_transport());
                assert!(cache.get(&op.cache_key()).error.is_some());

                let pending = cache.execute(&op);
                settle().await;
                assert_eq!(http.call_count(), 2);
                http.resolve_data(1, cities());
                let result = pending.await;
                assert_eq!(result.data, Some(cities()));
                assert!(result.is_ok());

                // Recovered entries are cached as usual.
                cache.execute(&op).await;
                assert_eq!(http.call_count(), 2);
            })
            .await;
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_earlier_data() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));

                let pending = cache.execute(&op);
                settle().await;
                http.resolve_data(0, cities());
                pending.await;

                let pending = cache.refetch(&op);
                settle().await;
                http.resolve(1, Err(TransportError::Network("reset".into())));
                pending.await;

                let snapshot = cache.get(&op.cache_key());
                assert_eq!(snapshot.data, Some(cities()));
                assert!(snapshot.error.unwrap().is_transport());
            })
            .await;
    }

    #[tokio::test]
    async fn protocol_errors_keep_partial_data() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));

                let pending = cache.execute(&op);
                settle().await;
                http.resolve(
                    0,
                    Ok(GraphQLResponse {
                        data: Some(json!({ "city": [{ "id": 1, "name": "Cityville" }], "secret": null })),
                        errors: vec![GraphQLError::new("no access to secret")],
                    }),
                );
                let result = pending.await;
                assert_eq!(result.data.unwrap()["city"][0]["name"], "Cityville");
                assert_eq!(result.error.unwrap().graphql_errors()[0].message, "no access to secret");
            })
            .await;
    }

    #[tokio::test]
    async fn watchers_see_loading_then_value() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));

                let mut watch = cache.watch(&op.cache_key());
                assert_eq!(watch.next().await.unwrap(), CacheSnapshot::default());

                let pending = cache.execute(&op);
                assert!(watch.next().await.unwrap().loading);

                settle().await;
                http.resolve_data(0, cities());
                pending.await;

                let done = watch.next().await.unwrap();
                assert!(!done.loading);
                assert_eq!(done.data, Some(cities()));
                assert_eq!(done.version, 1);
            })
            .await;
    }

    #[tokio::test]
    async fn pushes_replace_and_fan_out_over_one_stream() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = Operation::subscription("NeedAdded", "subscription NeedAdded { need { id } }");

                let mut a = cache.subscribe(&op);
                let mut b = cache.subscribe(&op);
                assert_eq!(ws.subscription_count(), 1, "one stream per key");
                assert!(a.next().await.unwrap().loading);
                assert!(b.next().await.unwrap().loading);

                ws.push_data(0, json!({ "need": [{ "id": 1 }, { "id": 2 }] }));
                settle().await;
                ws.push_data(0, json!({ "need": [{ "id": 3 }] }));
                settle().await;

                for rx in [&mut a, &mut b] {
                    assert_eq!(rx.next().await.unwrap().data, Some(json!({ "need": [{ "id": 1 }, { "id": 2 }] })));
                    assert_eq!(rx.next().await.unwrap().data, Some(json!({ "need": [{ "id": 3 }] })));
                }

                // A dropped socket keeps the last data and flags the error.
                ws.push(0, Err(TransportError::StreamReset("connection lost".into())));
                settle().await;
                let reset = a.next().await.unwrap();
                assert_eq!(reset.data, Some(json!({ "need": [{ "id": 3 }] })));
                assert!(reset.error.unwrap().is_transport());

                drop(a);
                drop(b);
                ws.push_data(0, json!({ "need": [] }));
                settle().await;
                assert_eq!(ws.stopped(), 1, "stream stops once nobody watches");
            })
            .await;
    }

    #[tokio::test]
    async fn executing_a_subscription_waits_for_the_next_push() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = Operation::subscription("NeedAdded", "subscription NeedAdded { need { id } }");

                let pending = cache.execute(&op);
                settle().await;
                ws.push_data(0, json!({ "need": [{ "id": 9 }] }));
                assert_eq!(pending.await.data, Some(json!({ "need": [{ "id": 9 }] })));
                assert_eq!(http.call_count(), 0);
            })
            .await;
    }

    #[tokio::test]
    async fn successful_mutation_refreshes_watched_queries() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let needs = Operation::query("Needs", "query Needs { need { id } }");

                let _watch = cache.watch(&needs.cache_key());
                let pending = cache.execute(&needs);
                settle().await;
                http.resolve_data(0, json!({ "need": [] }));
                pending.await;

                let insert = Operation::mutation("InsertNeed", "mutation InsertNeed { insert_need { affected_rows } }")
                    .refetch_queries(["Needs"]);
                let first = cache.execute(&insert);
                let second = cache.execute(&insert);
                settle().await;
                assert_eq!(http.call_count(), 3, "mutations are never deduplicated");

                http.resolve_data(1, json!({ "insert_need": { "affected_rows": 1 } }));
                http.resolve(2, Err(TransportError::Network("reset".into())));
                assert!(first.await.is_ok());
                assert!(!second.await.is_ok());
                settle().await;

                assert_eq!(http.call_count(), 4, "watched Needs query refetched");
                assert_eq!(http.call(3).name(), "Needs");
                http.resolve_data(3, json!({ "need": [{ "id": 1 }] }));
                settle().await;
                assert_eq!(
                    cache.get(&needs.cache_key()).data,
                    Some(json!({ "need": [{ "id": 1 }] }))
                );
            })
            .await;
    }

    #[tokio::test]
    async fn shutdown_refuses_work_and_ends_watchers() {
        LocalSet::new()
            .run_until(async {
                let (http, ws) = (ScriptedChannel::new(), ScriptedStream::new());
                let cache = cache_with(&http, &ws);
                let op = city_query(json!({}));
                let mut watch = cache.watch(&op.cache_key());
                watch.next().await;

                cache.shutdown();
                assert!(watch.next().await.is_none());
                assert_eq!(
                    cache.execute(&op).await.error,
                    Some(ClientError::Shutdown)
                );
                assert_eq!(http.call_count(), 0);
            })
            .await;
    }
}
