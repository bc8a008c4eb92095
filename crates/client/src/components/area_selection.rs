//! District and city pickers bound to the dependent-selection controller.

use dioxus::prelude::*;
use relieflink_shared::{districts_for_select, districts_query};

use crate::components::ui::Select;
use crate::hooks::{use_dependent_selection, use_query, SelectionHandle};
use crate::selection::SelectionPhase;

#[component]
pub fn AreaSelection() -> Element {
    let districts = use_query(districts_query());
    let selection = use_dependent_selection();
    let state = selection.state();

    let district_options = districts_for_select(districts.data().as_ref());
    let city_error = state.error.as_ref().map(|e| e.to_string());

    let upstream = selection.clone();
    let downstream: SelectionHandle = selection.clone();

    rsx! {
        section { class: "py-8",
            div { class: "mx-auto max-w-xl rounded-lg bg-white p-6 shadow",
                div { class: "grid grid-cols-2 gap-4",
                    Select {
                        placeholder: "Select district",
                        options: district_options,
                        value: state.upstream.clone(),
                        loading: districts.loading(),
                        error: districts.error().map(|e| e.to_string()),
                        onchange: move |raw| {
                            if let Err(error) = upstream.select_upstream_raw(&raw) {
                                crate::log_warn!("Ignoring district selection: {}", error);
                            }
                        },
                    }
                    Select {
                        placeholder: "Select city",
                        options: state.downstream_options.clone(),
                        value: state.downstream.clone(),
                        loading: state.downstream_loading,
                        disabled: state.phase == SelectionPhase::Idle,
                        error: city_error,
                        onchange: move |raw| {
                            if let Err(error) = downstream.select_downstream_raw(&raw) {
                                crate::log_warn!("Ignoring city selection: {}", error);
                            }
                        },
                    }
                }
            }
        }
    }
}
