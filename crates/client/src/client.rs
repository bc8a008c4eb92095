//! The application-wide data-access client.

use std::rc::Rc;

use futures_channel::mpsc::UnboundedReceiver;
use relieflink_shared::{CacheKey, Operation};

use crate::cache::{CacheSnapshot, NormalizedCache, OperationResult};
use crate::config::ClientConfig;
use crate::interceptor::{ErrorInterceptor, ErrorSink};
use crate::link::Link;
use crate::router::OperationRouter;
use crate::runtime::Spawner;
use crate::transport::http::HttpChannel;
use crate::transport::ws::WsChannel;
use crate::transport::{ConnectionState, EphemeralChannel, PersistentChannel};

/// One per application. Cheap to clone; clones share the cache and channels.
#[derive(Clone)]
pub struct Client {
    cache: NormalizedCache,
    link: Link,
}

impl Client {
    /// Build the HTTP and WebSocket channels described by `config`.
    pub fn new(config: &ClientConfig) -> Self {
        Self::builder_for(config).build()
    }

    /// A builder with both channels from `config` already set.
    pub fn builder_for(config: &ClientConfig) -> ClientBuilder {
        crate::log_info!(
            "Client starting: http={} ws={}",
            config.http_endpoint,
            config.ws_endpoint
        );
        ClientBuilder::new()
            .ephemeral(Rc::new(HttpChannel::new(
                config.http_endpoint.clone(),
                config.request_timeout_ms,
            )))
            .persistent(Rc::new(WsChannel::connect(
                config.ws_endpoint.clone(),
                config.reconnect.clone(),
            )))
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn cache(&self) -> &NormalizedCache {
        &self.cache
    }

    pub async fn execute(&self, operation: &Operation) -> OperationResult {
        self.cache.execute(operation).await
    }

    pub async fn refetch(&self, operation: &Operation) -> OperationResult {
        self.cache.refetch(operation).await
    }

    pub fn get(&self, key: &CacheKey) -> CacheSnapshot {
        self.cache.get(key)
    }

    pub fn watch(&self, key: &CacheKey) -> UnboundedReceiver<CacheSnapshot> {
        self.cache.watch(key)
    }

    /// Snapshots of a subscription's entry, one per push.
    pub fn subscribe(&self, operation: &Operation) -> UnboundedReceiver<CacheSnapshot> {
        self.cache.subscribe(operation)
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.cache.invalidate(key)
    }

    pub fn invalidate_named(&self, name: &str) -> usize {
        self.cache.invalidate_named(name)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.link.connection_state()
    }

    /// Close the persistent channel and drop every cache entry. Idempotent.
    pub fn shutdown(&self) {
        if self.cache.is_shut_down() {
            return;
        }
        crate::log_info!("Client shutting down");
        self.cache.shutdown();
        self.link.close();
    }
}

/// Assembles a [`Client`] from explicit parts; channels left unset make
/// operations of that kind fail with a configuration error.
#[derive(Default)]
pub struct ClientBuilder {
    router: OperationRouter,
    sink: Option<Rc<dyn ErrorSink>>,
    spawner: Option<Spawner>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ephemeral(mut self, channel: Rc<dyn EphemeralChannel>) -> Self {
        self.router = self.router.with_ephemeral(channel);
        self
    }

    pub fn persistent(mut self, channel: Rc<dyn PersistentChannel>) -> Self {
        self.router = self.router.with_persistent(channel);
        self
    }

    pub fn error_sink(mut self, sink: Rc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spawner(mut self, spawner: Spawner) -> Self {
        self.spawner = Some(spawner);
        self
    }

    pub fn build(self) -> Client {
        let interceptor = self
            .sink
            .map(ErrorInterceptor::new)
            .unwrap_or_default();
        let link = Link::new(self.router, interceptor);
        let cache = NormalizedCache::new(link.clone(), self.spawner.unwrap_or_default());
        Client { cache, link }
    }
}
