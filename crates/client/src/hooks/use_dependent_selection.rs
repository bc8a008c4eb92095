use dioxus::prelude::*;
use futures_util::StreamExt;
use relieflink_shared::{SelectOption, SelectionError};
use serde_json::Value;

use crate::provider::use_client;
use crate::selection::{SelectionController, SelectionState};

#[derive(Clone)]
pub struct SelectionHandle {
    state: Signal<SelectionState>,
    controller: SelectionController,
}

impl SelectionHandle {
    pub fn state(&self) -> SelectionState {
        self.state.cloned()
    }

    pub fn select_upstream(&self, value: Option<SelectOption>) {
        spawn(self.controller.select_upstream(value));
    }

    pub fn select_upstream_raw(&self, raw: &Value) -> Result<(), SelectionError> {
        spawn(self.controller.select_upstream_raw(raw)?);
        Ok(())
    }

    pub fn select_downstream_raw(&self, raw: &Value) -> Result<(), SelectionError> {
        self.controller.select_downstream_raw(raw)
    }

    pub fn reset(&self) {
        self.controller.reset();
    }
}

/// District → city selection for the calling component. Reset when the
/// component unmounts.
pub fn use_dependent_selection() -> SelectionHandle {
    let client = use_client();
    let controller = use_hook(|| SelectionController::district_city(client));
    let state = use_signal(|| controller.state());

    let listener = controller.clone();
    use_future(move || {
        let mut changes = listener.changes();
        let mut state = state;
        async move {
            while let Some(next) = changes.next().await {
                state.set(next);
            }
        }
    });

    let on_drop = controller.clone();
    use_drop(move || on_drop.reset());

    SelectionHandle { state, controller }
}
