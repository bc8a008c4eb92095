//! Relieflink client - data-access core and Dioxus web application.
//!
//! Operations are routed by kind to an HTTP or WebSocket channel, observed by
//! an error interceptor and served through a normalized, deduplicating
//! cache. Components reach it through [`ClientProvider`] and the hooks in
//! [`hooks`].

#[macro_use]
pub mod logging;

pub mod cache;
pub mod client;
pub mod config;
pub mod interceptor;
pub mod link;
pub mod notify;
pub mod provider;
pub mod router;
pub mod runtime;
pub mod selection;
pub mod transport;
pub mod validation;

pub mod components;
pub mod hooks;
pub mod routes;
pub mod views;

pub use cache::{CacheSnapshot, NormalizedCache, OperationResult};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, ReconnectConfig};
pub use provider::{use_client, ClientProvider};
pub use routes::Route;
pub use selection::{DependentSelection, SelectionController, SelectionPhase, SelectionState};
