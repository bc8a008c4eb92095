//! The "add request" form.

use dioxus::prelude::*;
use relieflink_shared::{
    all_cities, cities_for_select, insert_need, item_categories_for_select, item_categories_query,
    NeedInput,
};

use crate::components::ui::{Button, ButtonVariant, CheckboxGroup, Input, Select};
use crate::hooks::use_query;
use crate::notify::{self, ToastOptions};
use crate::provider::use_client;
use crate::validation::{validate_request, Field, RequestForm, ValidationErrors};
use crate::Route;

pub const TERMS_REQUIRED: &str = "Please read and agree to the terms and conditions first.";
pub const REQUEST_ADDED: &str = "Your request was added. Stay safe!";
pub const REQUEST_FAILED: &str = "Could not add your request. Please try again later.";
const LOAD_FAILED: &str = "Something went wrong! Please try again in a few minutes. Maybe our systems got overloaded.";

/// What pressing submit should do.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitStep {
    /// A submission is already running.
    Busy,
    Invalid(ValidationErrors),
    TermsRequired,
    Submit(NeedInput),
}

pub fn plan_submit(form: &RequestForm, in_flight: bool) -> SubmitStep {
    if in_flight {
        return SubmitStep::Busy;
    }
    match validate_request(form) {
        Err(errors) => SubmitStep::Invalid(errors),
        Ok(_) if !form.agree_to_terms => SubmitStep::TermsRequired,
        Ok(need) => SubmitStep::Submit(need),
    }
}

#[component]
pub fn CreateRequest() -> Element {
    let client = use_client();
    let nav = use_navigator();

    let cities = use_query(all_cities());
    let categories = use_query(item_categories_query());

    let mut form = use_signal(RequestForm::default);
    let mut errors = use_signal(ValidationErrors::default);
    let mut submitting = use_signal(|| false);

    if cities.error().is_some() || categories.error().is_some() {
        return rsx! {
            div { class: "mx-auto max-w-2xl p-8",
                div { class: "rounded bg-red-100 p-4 text-red-900", "{LOAD_FAILED}" }
            }
        };
    }

    let city_options = cities_for_select(cities.data().as_ref());
    let category_options = item_categories_for_select(categories.data().as_ref());
    let current = form.read().clone();
    let field_error = move |field: Field| errors.read().get(field).map(str::to_string);

    let onsubmit = move |evt: FormEvent| {
        evt.prevent_default();
        match plan_submit(&form.read(), submitting()) {
            SubmitStep::Busy => {}
            SubmitStep::Invalid(found) => errors.set(found),
            SubmitStep::TermsRequired => {
                errors.set(ValidationErrors::default());
                notify::push(TERMS_REQUIRED, ToastOptions::error());
            }
            SubmitStep::Submit(need) => {
                errors.set(ValidationErrors::default());
                submitting.set(true);
                let client = client.clone();
                spawn(async move {
                    let result = client.execute(&insert_need(&need)).await;
                    submitting.set(false);
                    match result.error {
                        None => {
                            crate::log_info!("Request added for city {}", need.city_id);
                            notify::push(REQUEST_ADDED, ToastOptions::success());
                            nav.push(Route::Home {});
                        }
                        Some(error) => {
                            crate::log_error!("Adding request failed: {}", error);
                            notify::push(REQUEST_FAILED, ToastOptions::error());
                        }
                    }
                });
            }
        }
    };

    rsx! {
        div { class: "mx-auto max-w-3xl p-8",
            h1 { class: "text-2xl font-bold", "Add request" }
            p { class: "mb-6 text-gray-600", "State your needs and make a request" }

            div { class: "mb-6 rounded border-l-4 border-blue-500 bg-blue-50 p-4 text-sm",
                "Please try to contact the distributors in your area first. Only make a request if you have no other way to obtain the basics. If there are other people in your area who face the same difficulty, add their information too."
            }

            form { onsubmit,
                div { class: "grid gap-6 md:grid-cols-2",
                    div {
                        Input {
                            label: "Contact person name *",
                            name: "contactPersonName",
                            value: current.contact_person_name.clone(),
                            error: field_error(Field::ContactPersonName),
                            oninput: move |v| form.write().contact_person_name = v,
                        }
                        Input {
                            label: "Contact number *",
                            name: "contactNumber",
                            value: current.contact_number.clone(),
                            error: field_error(Field::ContactNumber),
                            oninput: move |v| form.write().contact_number = v,
                        }
                        Select {
                            label: "City *",
                            placeholder: "Select city",
                            options: city_options,
                            value: current.city.clone(),
                            loading: cities.loading(),
                            error: field_error(Field::City),
                            onchange: move |raw| match relieflink_shared::SelectOption::from_widget(&raw) {
                                Ok(city) => form.write().city = city,
                                Err(error) => crate::log_warn!("Ignoring city selection: {}", error),
                            },
                        }
                    }
                    div {
                        Input {
                            label: "Number of people *",
                            name: "numberOfPeople",
                            kind: "number",
                            value: current.number_of_people.clone(),
                            error: field_error(Field::NumberOfPeople),
                            oninput: move |v| form.write().number_of_people = v,
                        }
                        CheckboxGroup {
                            title: "Items needed *",
                            options: category_options,
                            selected: current.categories.clone(),
                            loading: categories.loading(),
                            error: field_error(Field::Categories),
                            onchange: move |picked| form.write().categories = picked,
                        }
                    }
                }

                label { class: "my-4 flex items-center gap-2 text-sm",
                    input {
                        r#type: "checkbox",
                        checked: current.agree_to_terms,
                        onchange: move |evt: Event<FormData>| form.write().agree_to_terms = evt.checked(),
                    }
                    "I give my consent to share the above details publicly and I have read and agree to the "
                    Link { class: "text-blue-700 underline", to: Route::Terms {}, "terms and conditions" }
                }

                div { class: "flex gap-3",
                    Button { r#type: "submit", loading: submitting(), "Submit" }
                    if !submitting() {
                        Button {
                            variant: ButtonVariant::Light,
                            onclick: move |_| { nav.push(Route::Home {}); },
                            "Cancel"
                        }
                    }
                }
            }
        }
    }
}
