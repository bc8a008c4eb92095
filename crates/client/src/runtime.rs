//! Single-threaded task spawning and timers for both targets.
//!
//! All client state lives on one logical thread: the browser event loop, or a
//! `tokio::task::LocalSet` natively.

use std::future::Future;
use std::rc::Rc;

use futures_util::future::{self, Either, LocalBoxFuture};
use futures_util::FutureExt;

/// Spawns `'static` non-`Send` futures onto the current logical thread.
#[derive(Clone)]
pub struct Spawner(Rc<dyn Fn(LocalBoxFuture<'static, ()>)>);

impl Spawner {
    pub fn new(spawn: impl Fn(LocalBoxFuture<'static, ()>) + 'static) -> Self {
        Self(Rc::new(spawn))
    }

    pub fn spawn(&self, fut: impl Future<Output = ()> + 'static) {
        (self.0)(fut.boxed_local());
    }
}

impl Default for Spawner {
    fn default() -> Self {
        Self::new(|fut| spawn_local(fut))
    }
}

impl std::fmt::Debug for Spawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Spawner")
    }
}

#[cfg(target_arch = "wasm32")]
pub fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    wasm_bindgen_futures::spawn_local(fut);
}

/// Must run inside a `tokio::task::LocalSet`.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_local(fut: impl Future<Output = ()> + 'static) {
    tokio::task::spawn_local(fut);
}

#[cfg(target_arch = "wasm32")]
pub async fn sleep_ms(ms: u64) {
    gloo_timers::future::TimeoutFuture::new(ms.min(u32::MAX as u64) as u32).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

/// Resolve `fut`, or `None` once `ms` milliseconds have passed.
pub async fn timeout<F: Future>(ms: u64, fut: F) -> Option<F::Output> {
    let fut = std::pin::pin!(fut);
    let timer = std::pin::pin!(sleep_ms(ms));
    match future::select(fut, timer).await {
        Either::Left((output, _)) => Some(output),
        Either::Right(((), _)) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_returns_output_when_fast() {
        assert_eq!(timeout(1_000, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn timeout_gives_up_on_slow_futures() {
        assert_eq!(timeout(5, future::pending::<()>()).await, None);
    }
}
