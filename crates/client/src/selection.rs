//! Two linked selection fields where the upstream value parameterizes the
//! query that supplies the downstream options (district → city).
//!
//! [`DependentSelection`] is the pure state machine; [`SelectionController`]
//! drives it through the client. Every fetch carries a [`FetchToken`] and
//! its result is applied only if that token is still the pending one, so a
//! slow response for an old upstream value can never overwrite a newer one.

use std::cell::RefCell;
use std::rc::Rc;

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::future::{self, LocalBoxFuture};
use futures_util::FutureExt;
use relieflink_shared::{
    cities_for_select, cities_in_district, ClientError, Operation, SelectOption, SelectionError,
};
use serde_json::Value;

use crate::cache::OperationResult;
use crate::client::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPhase {
    #[default]
    Idle,
    /// Upstream chosen; downstream options are loading or failed to load.
    UpstreamSelected,
    /// Options for the current upstream are available.
    Ready,
}

/// Identifies one dependent fetch: the upstream value it was issued for and
/// the selection generation at the time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken {
    upstream: i64,
    generation: u64,
}

impl FetchToken {
    pub fn upstream(&self) -> i64 {
        self.upstream
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub upstream: Option<SelectOption>,
    pub downstream: Option<SelectOption>,
    pub downstream_options: Vec<SelectOption>,
    pub downstream_loading: bool,
    /// Failure of the last dependent fetch.
    pub error: Option<ClientError>,
    pub phase: SelectionPhase,
}

#[derive(Debug, Default)]
pub struct DependentSelection {
    state: SelectionState,
    generation: u64,
    pending: Option<FetchToken>,
}

impl DependentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Change the upstream value. The downstream value and options are
    /// always cleared; returns the token of the fetch to issue, if any.
    pub fn select_upstream(&mut self, value: Option<SelectOption>) -> Option<FetchToken> {
        self.generation += 1;
        self.state.downstream = None;
        self.state.downstream_options.clear();
        self.state.error = None;

        match value {
            None => {
                self.state.upstream = None;
                self.state.downstream_loading = false;
                self.state.phase = SelectionPhase::Idle;
                self.pending = None;
                None
            }
            Some(option) => {
                let token = FetchToken {
                    upstream: option.value,
                    generation: self.generation,
                };
                self.state.upstream = Some(option);
                self.state.downstream_loading = true;
                self.state.phase = SelectionPhase::UpstreamSelected;
                self.pending = Some(token);
                Some(token)
            }
        }
    }

    /// Apply a finished fetch. Returns false if the result was stale and
    /// discarded.
    pub fn apply_options(
        &mut self,
        token: FetchToken,
        result: Result<Vec<SelectOption>, ClientError>,
    ) -> bool {
        if self.pending != Some(token) || self.state.phase != SelectionPhase::UpstreamSelected {
            crate::log_debug!(
                "Discarding stale options for upstream {} (generation {})",
                token.upstream,
                token.generation
            );
            return false;
        }

        self.pending = None;
        self.state.downstream_loading = false;
        match result {
            Ok(options) => {
                self.state.downstream_options = options;
                self.state.phase = SelectionPhase::Ready;
            }
            Err(error) => {
                crate::log_warn!("Loading options for upstream {} failed: {}", token.upstream, error);
                self.state.error = Some(error);
            }
        }
        true
    }

    /// Set the downstream value. Must be one of the loaded options; clearing
    /// is always allowed. Never touches upstream.
    pub fn select_downstream(&mut self, value: Option<SelectOption>) -> Result<(), SelectionError> {
        let Some(option) = value else {
            self.state.downstream = None;
            return Ok(());
        };
        if self.state.phase != SelectionPhase::Ready {
            return Err(SelectionError::OptionsUnavailable);
        }
        let known = self
            .state
            .downstream_options
            .iter()
            .find(|o| o.value == option.value)
            .ok_or(SelectionError::UnknownOption(option.value))?;
        self.state.downstream = Some(known.clone());
        Ok(())
    }

    /// Back to `Idle`, e.g. when the form is left.
    pub fn reset(&mut self) {
        self.select_upstream(None);
    }
}

/// Supplies the dependent query and reads options out of its result.
pub trait OptionsSource {
    fn operation(&self, upstream: i64) -> Operation;
    fn options(&self, data: Option<&Value>) -> Vec<SelectOption>;
}

/// Cities of the selected district.
#[derive(Debug, Clone, Copy, Default)]
pub struct DistrictCities;

impl OptionsSource for DistrictCities {
    fn operation(&self, district_id: i64) -> Operation {
        cities_in_district(district_id)
    }

    fn options(&self, data: Option<&Value>) -> Vec<SelectOption> {
        cities_for_select(data)
    }
}

/// Drives a [`DependentSelection`] through the client and publishes every
/// state change.
#[derive(Clone)]
pub struct SelectionController {
    client: Client,
    source: Rc<dyn OptionsSource>,
    selection: Rc<RefCell<DependentSelection>>,
    listeners: Rc<RefCell<Vec<UnboundedSender<SelectionState>>>>,
}

impl SelectionController {
    pub fn new(client: Client, source: impl OptionsSource + 'static) -> Self {
        Self {
            client,
            source: Rc::new(source),
            selection: Rc::default(),
            listeners: Rc::default(),
        }
    }

    pub fn district_city(client: Client) -> Self {
        Self::new(client, DistrictCities)
    }

    pub fn state(&self) -> SelectionState {
        self.selection.borrow().state().clone()
    }

    /// Every state published after this call.
    pub fn changes(&self) -> UnboundedReceiver<SelectionState> {
        let (tx, rx) = unbounded();
        self.listeners.borrow_mut().push(tx);
        rx
    }

    /// Change upstream and issue the dependent query right away. The
    /// returned future applies the result; spawn or await it.
    pub fn select_upstream(&self, value: Option<SelectOption>) -> LocalBoxFuture<'static, ()> {
        let token = self.selection.borrow_mut().select_upstream(value);
        self.publish();

        let Some(token) = token else {
            return future::ready(()).boxed_local();
        };
        let operation = self.source.operation(token.upstream());
        // A new upstream always reloads its options.
        self.client.cache().invalidate(&operation.cache_key());
        let pending = self.client.cache().execute(&operation);
        let this = self.clone();
        async move {
            let result = pending.await;
            this.finish(token, result);
        }
        .boxed_local()
    }

    /// [`select_upstream`](Self::select_upstream) for an untyped widget value.
    pub fn select_upstream_raw(
        &self,
        raw: &Value,
    ) -> Result<LocalBoxFuture<'static, ()>, SelectionError> {
        let option = SelectOption::from_widget(raw)?;
        Ok(self.select_upstream(option))
    }

    pub fn select_downstream(&self, value: Option<SelectOption>) -> Result<(), SelectionError> {
        self.selection.borrow_mut().select_downstream(value)?;
        self.publish();
        Ok(())
    }

    pub fn select_downstream_raw(&self, raw: &Value) -> Result<(), SelectionError> {
        self.select_downstream(SelectOption::from_widget(raw)?)
    }

    pub fn reset(&self) {
        self.selection.borrow_mut().reset();
        self.publish();
    }

    fn finish(&self, token: FetchToken, result: OperationResult) {
        let outcome = match result.error {
            Some(error) => Err(error),
            None => Ok(self.source.options(result.data.as_ref())),
        };
        let applied = self.selection.borrow_mut().apply_options(token, outcome);
        if applied {
            self.publish();
        }
    }

    fn publish(&self) {
        let state = self.state();
        self.listeners
            .borrow_mut()
            .retain(|l| l.unbounded_send(state.clone()).is_ok());
    }
}
