//! Picks the channel that carries an operation.

use std::rc::Rc;

use relieflink_shared::{ConfigError, Operation, OperationKind};

use crate::transport::{ConnectionState, EphemeralChannel, PersistentChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Ephemeral,
    Persistent,
}

impl ChannelKind {
    /// Subscriptions need a standing connection; everything else is one-shot.
    pub fn for_kind(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Subscription => ChannelKind::Persistent,
            OperationKind::Query | OperationKind::Mutation => ChannelKind::Ephemeral,
        }
    }
}

/// The channel chosen for one dispatch.
#[derive(Clone)]
pub enum Route {
    Ephemeral(Rc<dyn EphemeralChannel>),
    Persistent(Rc<dyn PersistentChannel>),
}

impl Route {
    pub fn kind(&self) -> ChannelKind {
        match self {
            Route::Ephemeral(_) => ChannelKind::Ephemeral,
            Route::Persistent(_) => ChannelKind::Persistent,
        }
    }
}

#[derive(Clone, Default)]
pub struct OperationRouter {
    ephemeral: Option<Rc<dyn EphemeralChannel>>,
    persistent: Option<Rc<dyn PersistentChannel>>,
}

impl OperationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ephemeral(mut self, channel: Rc<dyn EphemeralChannel>) -> Self {
        self.ephemeral = Some(channel);
        self
    }

    pub fn with_persistent(mut self, channel: Rc<dyn PersistentChannel>) -> Self {
        self.persistent = Some(channel);
        self
    }

    /// Select the channel for `operation`, failing before any network
    /// activity when that channel is not configured.
    pub fn route(&self, operation: &Operation) -> Result<Route, ConfigError> {
        match ChannelKind::for_kind(operation.kind()) {
            ChannelKind::Ephemeral => self
                .ephemeral
                .clone()
                .map(Route::Ephemeral)
                .ok_or(ConfigError::NoChannel("request/response")),
            ChannelKind::Persistent => self
                .persistent
                .clone()
                .map(Route::Persistent)
                .ok_or(ConfigError::NoChannel("subscription")),
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.persistent
            .as_ref()
            .map(|p| p.state())
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub fn close(&self) {
        if let Some(persistent) = &self.persistent {
            persistent.close();
        }
    }
}
